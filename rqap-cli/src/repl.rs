//! Interactive session.

use crate::commands;
use colored::Colorize;
use rqap_client::Client;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};
use std::net::SocketAddr;

const HELP_TEXT: &str = r#"
Anything you type is sent to the server as an R expression.

Commands:
  :void <expr>   Evaluate without fetching the result
  :json          Toggle JSON rendering
  help           Show this help
  quit, exit     Leave the session
"#;

pub async fn run(
    client: &mut Client,
    addr: SocketAddr,
    mut as_json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "rqap".bold().cyan());
    println!("Connecting to {}...", addr);

    client.connect().await?;
    println!("{}", "Connected!".green());

    let config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .build();
    let mut rl: Editor<(), DefaultHistory> = Editor::with_config(config)?;

    let history_path = std::env::var("HOME")
        .map(|h| std::path::PathBuf::from(h).join(".rqap_history"))
        .unwrap_or_else(|_| ".rqap_history".into());
    let _ = rl.load_history(&history_path);

    println!("Type 'help' for commands.\n");

    loop {
        let prompt = format!("{} ", "R>".cyan());
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match line {
                    "quit" | "exit" => break,
                    "help" => {
                        println!("{}", HELP_TEXT);
                        continue;
                    }
                    ":json" => {
                        as_json = !as_json;
                        println!(
                            "JSON rendering {}\n",
                            if as_json { "on" } else { "off" }
                        );
                        continue;
                    }
                    _ => {}
                }

                let result = if let Some(expr) = line.strip_prefix(":void ") {
                    client
                        .eval_void(expr)
                        .await
                        .map(|_| "OK".green().to_string())
                } else {
                    client
                        .eval(line)
                        .await
                        .map(|value| commands::render(&value, as_json))
                };

                match result {
                    Ok(output) => println!("{}\n", output),
                    Err(e) => println!("{}: {}\n", "Error".red(), commands::describe(&e)),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("^D");
                break;
            }
            Err(err) => {
                println!("{}: {:?}", "Error".red(), err);
                break;
            }
        }
    }

    let _ = rl.save_history(&history_path);
    let _ = client.close().await;
    println!("{}", "Disconnected.".dimmed());

    Ok(())
}
