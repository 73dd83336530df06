use super::*;

#[test]
fn test_parse_queue_dead_letters() {
    let cli = Cli::try_parse_from(["sheetpulse", "queue", "dead-letters", "--tenant", "42"]).unwrap();
    match cli.command {
        Some(Commands::Queue {
            action: QueueAction::DeadLetters { tenant },
        }) => assert_eq!(tenant.as_deref(), Some("42")),
        _ => panic!("expected queue dead-letters"),
    }
}

#[test]
fn test_parse_queue_status() {
    let cli = Cli::try_parse_from(["sheetpulse", "queue", "status"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Queue {
            action: QueueAction::Status
        })
    ));
}

#[test]
fn test_no_subcommand_defaults_to_run() {
    let cli = Cli::try_parse_from(["sheetpulse"]).unwrap();
    assert!(cli.command.is_none());
}
