use clap::Parser;
use owdctrl::{
    config::Cli,
    Pipeline,
};
use owdrepo::fetcher::GitFetcher;
use owdtool::invoker::WskDeploy;
use std::{
    io::{
        self,
        Write,
    },
    process,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Cli::parse();
    stderrlog::new()
        .module(module_path!())
        .modules(["owdcore", "owdctrl", "owdrepo", "owdtool"])
        .verbosity((args.verbose as usize) + 1)
        .timestamp(stderrlog::Timestamp::Second)
        .init()?;

    let request = args.request()?;
    let timeout = args.timeout();
    let fetcher = GitFetcher::new(args.policy)
        .timeout(timeout);
    let invoker = WskDeploy::new(args.wskdeploy())
        .timeout(timeout);
    let pipeline = Pipeline::new(fetcher, invoker, args.work_root())
        .cleanup(args.cleanup());
    log::debug!(
        "using {:?} with working copies under {:?} ({} policy)",
        args.wskdeploy(),
        pipeline.work_root(),
        args.policy,
    );

    let mut stdout = io::stdout();
    match pipeline.deploy(request).await {
        Ok(result) => {
            serde_json::to_writer(&mut stdout, &result)?;
            writeln!(stdout)?;
            Ok(())
        }
        Err(e) => {
            log::error!("{e}");
            serde_json::to_writer(&mut stdout, &e.payload())?;
            writeln!(stdout)?;
            stdout.flush()?;
            process::exit(1);
        }
    }
}
