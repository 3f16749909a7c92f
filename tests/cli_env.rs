use clap::Parser;

use topup::cli::{Cli, Commands};

fn parse_with_dry_run_env(value: &str, args: &[&str]) -> Cli {
    std::env::set_var("DRY_RUN", value);
    let parsed = Cli::try_parse_from(args);
    std::env::remove_var("DRY_RUN");
    parsed.unwrap_or_else(|e| panic!("DRY_RUN={} rejected: {}", value, e))
}

// One test: DRY_RUN is process-wide.
#[test]
fn dry_run_env_accepts_boolish_values() {
    for value in ["1", "true", "TRUE", "yes", "on"] {
        assert!(parse_with_dry_run_env(value, &["topup"]).dry_run, "{}", value);
    }
    for value in ["0", "false", "FALSE", "no", "off"] {
        assert!(!parse_with_dry_run_env(value, &["topup"]).dry_run, "{}", value);
    }

    let cli = parse_with_dry_run_env("1", &["topup", "run"]);
    assert!(matches!(cli.command, Some(Commands::Run)));
    assert!(cli.dry_run);

    std::env::remove_var("DRY_RUN");
    assert!(!Cli::try_parse_from(["topup", "run"]).unwrap().dry_run);
}
