//! Interactive prompt loop.

use crate::render;
use crate::session::Session;
use anyhow::Result;
use bashai_interfaces::Interface;

const HISTORY_SHOWN: usize = 10;

pub async fn run(session: &Session) -> Result<()> {
    let term = session.terminal();
    term.send_output(&render::ui_title("bashai interactive mode")).await;
    term.send_output(&render::ui_dim(&format!(
        "{} | type 'help' for commands, 'exit' to quit",
        session.profile().describe()
    )))
    .await;

    loop {
        term.send_output("").await;
        term.show_status("What should I do?").await;

        let line = tokio::select! {
            line = term.receive_input() => line,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(input) = line else {
            term.send_output("👋 Goodbye!").await;
            break;
        };

        match input.as_str() {
            "" => continue,
            "exit" | "quit" => {
                term.send_output("👋 Goodbye!").await;
                break;
            }
            "help" => {
                term.send_output(&help_text()).await;
            }
            "history" => {
                match session.history().recent(HISTORY_SHOWN).await {
                    Ok(entries) => term.send_output(&render::render_history(&entries)).await,
                    Err(e) => {
                        term.send_output(&render::ui_warn(&format!("Could not read history: {}", e)))
                            .await
                    }
                }
            }
            "clear" => {
                term.send_output("\x1B[2J\x1B[1;1H").await;
            }
            request => {
                session.handle(request).await;
            }
        }
    }

    Ok(())
}

fn help_text() -> String {
    format!(
        "{}\n  exit, quit  - leave interactive mode\n  help        - show this message\n  history     - show recent requests\n  clear       - clear the screen\n\n{}",
        render::ui_title("Commands:"),
        render::ui_dim("Anything else is translated into a command and run. Ctrl-C cancels a running request.")
    )
}
