// Stands in for wskdeploy: records how it was invoked into
// `fakedeploy.json` in its working directory, then behaves according to
// the FAKEDEPLOY_MODE environment variable.
use std::{
    env,
    fs,
    io::{self, Read, Write},
    process::ExitCode,
    thread,
    time::Duration,
};

fn main() -> io::Result<ExitCode> {
    let args: Vec<String> = env::args().skip(1).collect();
    let cwd = env::current_dir()?;
    let mut stdin = String::new();
    io::stdin().read_to_string(&mut stdin)?;
    let env: Vec<(String, String)> = env::vars()
        .filter(|(k, _)| k == "PACKAGE_NAME" || k.starts_with("WSK_TEST_"))
        .collect();

    let mut record = fs::File::create(cwd.join("fakedeploy.json"))?;
    write!(record, "{{")?;
    write!(record, r#""args":{args:?},"#)?;
    write!(record, r#""cwd":{:?},"#, cwd.display().to_string())?;
    write!(record, r#""stdin":{stdin:?},"#)?;
    write!(record, r#""env":{{"#)?;
    for (i, (k, v)) in env.iter().enumerate() {
        if i > 0 {
            write!(record, ",")?;
        }
        write!(record, "{k:?}:{v:?}")?;
    }
    write!(record, "}}}}")?;

    if stdin != "y" {
        eprintln!("deployment cancelled");
        return Ok(ExitCode::from(4));
    }
    let manifest = args.iter()
        .position(|a| a == "-m")
        .and_then(|i| args.get(i + 1));
    match manifest {
        Some(name) if cwd.join(name).is_file() => (),
        _ => {
            eprintln!("manifest not found");
            return Ok(ExitCode::from(3));
        }
    }

    match env::var("FAKEDEPLOY_MODE").as_deref() {
        Ok("text") => {
            println!("Deployment completed successfully.");
        }
        Ok("report") => {
            print!(r#"{{"error":"The manifest could not be deployed"}}"#);
        }
        Ok("warn") => {
            eprintln!("warning: runtime nodejs:10 is deprecated");
            print!(r#"{{"status":"deployed"}}"#);
        }
        Ok("fail") => {
            eprintln!("unable to reach api host");
            return Ok(ExitCode::from(2));
        }
        Ok("sleep") => {
            thread::sleep(Duration::from_secs(30));
        }
        _ => {
            print!(r#"{{"status":"deployed"}}"#);
        }
    }
    Ok(ExitCode::SUCCESS)
}
