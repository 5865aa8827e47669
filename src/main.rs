use clap::{Arg, ArgAction, ArgMatches, Command};
use log::LevelFilter;
use std::error::Error;
use std::process;
use std::rc::Rc;

use petrotrade_portal::auth::SessionHooks;
use petrotrade_portal::tokens::AccessToken;
use petrotrade_portal::utils::clock::SystemClock;
use petrotrade_portal::utils::format::format_currency;
use petrotrade_portal::utils::io::{prompt, prompt_with_confirmation};
use petrotrade_portal::utils::logging::initialize_logging;
use petrotrade_portal::utils::time::{format_duration, utc_to_local};
use petrotrade_portal::{FileStore, MemoryStore, Portal, PortalConfig, Storage, CONFIG_FILE};

/// Session hooks for a terminal: messages go to stdout
struct TerminalHooks;

impl SessionHooks for TerminalHooks {
    fn notify(&self, message: &str) {
        println!("\n{}", message);
    }

    fn redirect_to_login(&self) {
        println!("Please log in to continue.");
    }
}

fn build_cli() -> Command {
    Command::new("petrotrade-portal")
        .about("PetroTrade brokerage portal: sessions, single-use IRS tokens and withdrawals")
        .arg(
            Arg::new("config")
                .long("config")
                .help("Path to the JSON configuration file")
                .value_name("FILE")
                .global(true),
        )
        .arg(
            Arg::new("data-file")
                .long("data-file")
                .help("Where portal state is kept")
                .value_name("FILE")
                .global(true),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .help("Session timeout in seconds")
                .value_name("SECONDS")
                .value_parser(clap::value_parser!(u64))
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Log debug output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("login")
                .about("Log in to the portal")
                .arg(Arg::new("username").help("Account username").required(true))
                .arg(
                    Arg::new("password")
                        .long("password")
                        .help("Password (prompted for when omitted)"),
                ),
        )
        .subcommand(Command::new("logout").about("End the current session"))
        .subcommand(Command::new("status").about("Show the current session"))
        .subcommand(Command::new("balance").about("Show the account balance"))
        .subcommand(
            Command::new("verify-token")
                .about("Consume an IRS access token")
                .arg(Arg::new("token").help("The access token").required(true)),
        )
        .subcommand(
            Command::new("tokens").about("List access tokens").arg(
                Arg::new("used")
                    .long("used")
                    .help("List consumed tokens instead of available ones")
                    .action(ArgAction::SetTrue),
            ),
        )
        .subcommand(
            Command::new("reset-tokens")
                .about("Reset every token to unused (demo only)")
                .arg(
                    Arg::new("yes")
                        .long("yes")
                        .help("Skip the confirmation prompt")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("transactions").about("List transactions").arg(
                Arg::new("export")
                    .long("export")
                    .help("Write the transactions to a CSV file")
                    .value_name("FILE"),
            ),
        )
        .subcommand(
            Command::new("withdraw")
                .about("Withdraw funds using a fresh access token")
                .arg(
                    Arg::new("amount")
                        .help("Amount in dollars")
                        .required(true)
                        .value_parser(clap::value_parser!(f64)),
                )
                .arg(
                    Arg::new("token")
                        .long("token")
                        .help("An unused access token")
                        .required(true),
                )
                .arg(
                    Arg::new("method")
                        .long("method")
                        .help("Withdrawal method")
                        .default_value("Bank Transfer"),
                ),
        )
        .subcommand(Command::new("shell").about("Interactive portal session"))
}

fn load_config(matches: &ArgMatches) -> Result<PortalConfig, Box<dyn Error>> {
    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or(CONFIG_FILE);
    let mut config = PortalConfig::load(config_path)?;

    if let Some(data_file) = matches.get_one::<String>("data-file") {
        config.data_file = data_file.clone();
    }
    if let Some(timeout) = matches.get_one::<u64>("timeout") {
        config.session_timeout_secs = *timeout;
    }
    Ok(config)
}

fn open_portal(config: &PortalConfig) -> Result<Portal, Box<dyn Error>> {
    let durable = FileStore::open(&config.data_file)?;
    // Each process is its own context, so session storage starts empty
    let storage = Storage::new(Rc::new(durable), Rc::new(MemoryStore::new()));
    Ok(Portal::new(storage, Rc::new(SystemClock), config).with_hooks(Box::new(TerminalHooks)))
}

fn print_tokens(tokens: &[AccessToken]) {
    if tokens.is_empty() {
        println!("No tokens.");
        return;
    }
    for token in tokens {
        match (&token.issued_to, token.used_at) {
            (Some(issued_to), Some(used_at)) => println!(
                "{}  used by {} at {}",
                token.token,
                issued_to,
                utc_to_local(used_at.timestamp_millis())
            ),
            _ => println!("{}", token.token),
        }
    }
}

fn print_status(portal: &mut Portal) {
    match portal.current_identity() {
        Some(identity) => {
            println!("Logged in as {} ({})", identity.full_name, identity.username);
            println!("Balance: {}", format_currency(identity.balance));
            if let Some(last_login) = identity.last_login {
                println!("Last login: {}", utc_to_local(last_login.timestamp_millis()));
            }
            if let Some(remaining) = portal.auth().remaining_ms() {
                println!("Session expires in {}", format_duration(remaining));
            }
            let access = if portal.has_valid_access() {
                "granted"
            } else {
                "not granted"
            };
            println!("Token access: {}", access);
        }
        None => println!("Not logged in."),
    }
}

fn login(portal: &mut Portal, username: &str, password: Option<&str>) -> Result<(), Box<dyn Error>> {
    let password = match password {
        Some(password) => password.to_string(),
        None => rpassword::prompt_password("Password: ")?,
    };

    match portal.authenticate(username, &password) {
        Ok(identity) => {
            println!("Welcome, {}!", identity.full_name);
            println!("Balance: {}", format_currency(identity.balance));
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn verify_and_activate(portal: &mut Portal, token: &str) -> bool {
    match portal.verify_token_detailed(token) {
        Ok(consumed) => {
            portal.activate();
            println!("Token {} accepted. Withdrawal access granted.", consumed.token);
            true
        }
        Err(_) => {
            // Unknown and already used tokens look the same to the user
            println!("Invalid or already used token.");
            false
        }
    }
}

fn withdraw(portal: &mut Portal, amount: f64, method: &str) -> bool {
    match portal.withdraw(amount, method) {
        Ok(transaction) => {
            println!(
                "Withdrew {} ({}). New balance: {}",
                format_currency(-transaction.amount),
                transaction.reference,
                format_currency(portal.balance())
            );
            let limits = portal.withdrawal_limits();
            println!(
                "Withdrawn today: {} of {}",
                format_currency(portal.today_withdrawal_total()),
                format_currency(limits.daily)
            );
            true
        }
        Err(e) => {
            println!("{}", e);
            false
        }
    }
}

fn print_transactions(portal: &Portal) {
    for transaction in portal.transactions() {
        println!(
            "{:<20} {:<32} {:<6} {:>14}  {}",
            transaction.date,
            transaction.description,
            transaction.kind.as_str(),
            format_currency(transaction.amount),
            transaction.reference
        );
    }
}

fn export_transactions(portal: &Portal, path: &str) -> Result<(), Box<dyn Error>> {
    std::fs::write(path, portal.export_transactions_csv())?;
    println!("Transactions exported to {}", path);
    Ok(())
}

fn reset_tokens(portal: &mut Portal, skip_confirmation: bool) -> Result<(), Box<dyn Error>> {
    if !skip_confirmation
        && !prompt_with_confirmation(
            "This marks every access token as unused.",
            "Reset all tokens?",
        )?
    {
        println!("Cancelled.");
        return Ok(());
    }
    portal.reset_all();
    println!("All tokens reset.");
    Ok(())
}

fn show_shell_help() {
    println!("\nCommands:");
    println!("  login <username> [password]");
    println!("  logout                  Log out");
    println!("  status                  Show the session");
    println!("  balance                 Show the balance");
    println!("  verify <token>          Consume an access token");
    println!("  tokens | used           List available or consumed tokens");
    println!("  withdraw <amount> [method]");
    println!("  transactions            List transactions");
    println!("  export <file>           Export transactions as CSV");
    println!("  delete <index>          Delete a transaction");
    println!("  reset-tokens            Reset every token (demo only)");
    println!("  exit                    Leave the shell");
}

#[derive(Debug, PartialEq)]
enum ShellStep {
    Continue,
    Exit,
}

/// One shell command. Due timers fire first and print their notice through
/// the hooks; the command itself still runs and counts as activity.
fn run_shell_command(portal: &mut Portal, line: &str) -> Result<ShellStep, Box<dyn Error>> {
    portal.run_due_timers();

    let mut words = line.split_whitespace();
    let command = match words.next() {
        Some(command) => command,
        None => return Ok(ShellStep::Continue),
    };
    let rest: Vec<&str> = words.collect();

    match command {
        "help" => show_shell_help(),
        "exit" | "quit" => {
            println!("Goodbye!");
            return Ok(ShellStep::Exit);
        }
        "login" => match rest.first() {
            Some(username) => {
                if let Err(e) = login(portal, username, rest.get(1).copied()) {
                    println!("{}", e);
                }
            }
            None => println!("Usage: login <username> [password]"),
        },
        "logout" => {
            portal.deauthenticate();
            println!("Logged out.");
        }
        "status" => print_status(portal),
        "balance" => println!("Balance: {}", format_currency(portal.balance())),
        "tokens" => print_tokens(&portal.list_available()),
        "used" => print_tokens(&portal.list_consumed()),
        "transactions" => print_transactions(portal),
        "reset-tokens" => reset_tokens(portal, false)?,
        _ if !portal.check_session() => {}
        "verify" => match rest.first() {
            Some(token) => {
                verify_and_activate(portal, token);
            }
            None => println!("Usage: verify <token>"),
        },
        "withdraw" => match rest.first().and_then(|amount| amount.parse::<f64>().ok()) {
            Some(amount) => {
                let method = if rest.len() > 1 {
                    rest[1..].join(" ")
                } else {
                    "Bank Transfer".to_string()
                };
                withdraw(portal, amount, &method);
            }
            None => println!("Usage: withdraw <amount> [method]"),
        },
        "export" => match rest.first() {
            Some(path) => export_transactions(portal, path)?,
            None => println!("Usage: export <file>"),
        },
        "delete" => match rest.first().and_then(|index| index.parse::<usize>().ok()) {
            Some(index) if portal.delete_transaction(index) => {
                println!("Transaction deleted.")
            }
            _ => println!("Error: Transaction index is invalid."),
        },
        other => println!("Unknown command '{}'. Type 'help' for a list.", other),
    }

    portal.refresh_activity();
    Ok(ShellStep::Continue)
}

/// One portal context kept alive across commands
fn run_shell(portal: &mut Portal) -> Result<(), Box<dyn Error>> {
    println!("\n=== PetroTrade Portal ===");
    portal.restore();
    show_shell_help();

    loop {
        let line = prompt("\n> ")?;
        if run_shell_command(portal, &line)? == ShellStep::Exit {
            return Ok(());
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let matches = build_cli().get_matches();
    let config = load_config(&matches)?;

    let level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    if let Err(e) = initialize_logging(&config.log_file, level) {
        eprintln!("Warning: logging disabled: {}", e);
    }

    let mut portal = open_portal(&config)?;

    match matches.subcommand() {
        Some(("login", sub_matches)) => {
            let username = sub_matches
                .get_one::<String>("username")
                .ok_or("username is required")?;
            login(
                &mut portal,
                username,
                sub_matches.get_one::<String>("password").map(String::as_str),
            )?;
        }
        Some(("logout", _)) => {
            portal.deauthenticate();
            println!("Logged out.");
        }
        Some(("status", _)) => {
            portal.restore();
            print_status(&mut portal);
        }
        Some(("balance", _)) => {
            if portal.restore() {
                println!("Balance: {}", format_currency(portal.balance()));
            }
        }
        Some(("verify-token", sub_matches)) => {
            let token = sub_matches
                .get_one::<String>("token")
                .ok_or("token is required")?;
            if !portal.restore() || !verify_and_activate(&mut portal, token) {
                process::exit(1);
            }
        }
        Some(("tokens", sub_matches)) => {
            if sub_matches.get_flag("used") {
                print_tokens(&portal.list_consumed());
            } else {
                print_tokens(&portal.list_available());
            }
        }
        Some(("reset-tokens", sub_matches)) => {
            reset_tokens(&mut portal, sub_matches.get_flag("yes"))?;
        }
        Some(("transactions", sub_matches)) => match sub_matches.get_one::<String>("export") {
            Some(path) => export_transactions(&portal, path)?,
            None => print_transactions(&portal),
        },
        Some(("withdraw", sub_matches)) => {
            let amount = *sub_matches
                .get_one::<f64>("amount")
                .ok_or("amount is required")?;
            let token = sub_matches
                .get_one::<String>("token")
                .ok_or("token is required")?;
            let method = sub_matches
                .get_one::<String>("method")
                .map(String::as_str)
                .unwrap_or("Bank Transfer");

            if !portal.restore()
                || !verify_and_activate(&mut portal, token)
                || !withdraw(&mut portal, amount, method)
            {
                process::exit(1);
            }
        }
        Some(("shell", _)) => run_shell(&mut portal)?,
        _ => {
            build_cli().print_help()?;
            println!();
        }
    }

    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use petrotrade_portal::utils::clock::ManualClock;

    const START: i64 = 1_700_000_000_000;

    fn setup_portal() -> (Portal, Rc<ManualClock>) {
        let clock = Rc::new(ManualClock::new(START));
        let portal = Portal::new(Storage::in_memory(), clock.clone(), &PortalConfig::default())
            .with_hooks(Box::new(TerminalHooks));
        (portal, clock)
    }

    #[test]
    fn test_command_after_expiry_still_runs() {
        let (mut portal, clock) = setup_portal();
        portal.authenticate("MaryJane", "Godisgood").unwrap();

        clock.advance(PortalConfig::default().session_timeout_ms());
        let step = run_shell_command(&mut portal, "login MaryJane Godisgood").unwrap();

        assert_eq!(step, ShellStep::Continue);
        assert!(portal.is_session_valid());
        assert_eq!(portal.current_identity().unwrap().username, "MaryJane");
    }

    #[test]
    fn test_shell_exit_and_blank_lines() {
        let (mut portal, _clock) = setup_portal();
        assert_eq!(run_shell_command(&mut portal, "   ").unwrap(), ShellStep::Continue);
        assert_eq!(run_shell_command(&mut portal, "quit").unwrap(), ShellStep::Exit);
    }

    #[test]
    fn test_shell_commands_refresh_the_session() {
        let (mut portal, clock) = setup_portal();
        portal.authenticate("MaryJane", "Godisgood").unwrap();
        let timeout = PortalConfig::default().session_timeout_ms();

        clock.advance(timeout - 1_000);
        run_shell_command(&mut portal, "balance").unwrap();
        clock.advance(timeout - 1_000);
        assert!(portal.is_session_valid());
    }
}
