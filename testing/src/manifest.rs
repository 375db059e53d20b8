use textwrap_macros::dedent;

/// A manifest in the shape `wskdeploy` expects, with a package named
/// `blueprint`.
pub const MANIFEST: &str = dedent!(r#"
    package:
      name: blueprint
      version: 1.0.0
      actions:
        hello:
          function: actions/hello.js
          runtime: nodejs:10
          inputs:
            greeting: hello
      triggers:
        every-minute:
          feed: /whisk.system/alarms/alarm
    "#);

/// Valid yaml, but with nothing to rename.
pub const MANIFEST_NO_PACKAGE: &str = dedent!(r#"
    project:
      name: blueprint
    "#);

pub const MANIFEST_MALFORMED: &str = dedent!(r#"
    package:
      name: [blueprint
        actions: {
    "#);
