pub mod command;
pub mod parse;

use crate::shell::{
    command::{execute_command, Flow},
    parse::parse_command,
};
use colored::*;
use crossterm::{
    cursor, execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use flatfs::FilesystemImage;
use reedline::{
    DefaultCompleter, DefaultPrompt, DefaultPromptSegment, FileBackedHistory, Reedline, Signal,
};
use std::{io::stdout, path::PathBuf};

const PROMPT_NAME: &str = "flatfs";

const COMMANDS: [&str; 13] = [
    "help", "createfs", "savefs", "open", "close", "list", "df", "insert", "retrieve", "attrib",
    "stat", "quit", "exit",
];

pub fn start_shell() {
    banner();

    let username = whoami::username();
    let mut image = FilesystemImage::new();

    println!(
        "{}",
        "Type 'help' for available commands. Use ↑↓ for history, Tab for auto-completion.\n"
            .bright_black()
    );

    let history_path = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".flatfs_history");

    let mut line_editor = Reedline::create();
    match FileBackedHistory::with_file(100, history_path) {
        Ok(history) => line_editor = line_editor.with_history(Box::new(history)),
        Err(e) => log::warn!("command history disabled: {}", e),
    }

    let completer = DefaultCompleter::new_with_wordlen(
        COMMANDS.iter().map(|c| c.to_string()).collect(),
        2,
    );
    line_editor = line_editor.with_completer(Box::new(completer));

    loop {
        let image_name = image
            .path()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "-".to_string());
        let prompt = DefaultPrompt::new(
            DefaultPromptSegment::Basic(format!("{}:{}", username, image_name)),
            DefaultPromptSegment::Basic(PROMPT_NAME.to_string()),
        );

        match line_editor.read_line(&prompt) {
            Ok(Signal::Success(buffer)) => {
                let trimmed = buffer.trim();
                if trimmed.is_empty() {
                    continue;
                }

                match parse_command(trimmed) {
                    Ok(cmd) => match execute_command(&cmd, &mut image) {
                        Ok(Flow::Exit) => break,
                        Ok(Flow::Continue) => {}
                        Err(e) => println!("{} {}", "❌ ERROR:".red().bold(), e),
                    },
                    Err(msg) => println!("{} {}", "⚠️ ".yellow(), msg.yellow()),
                }
            }
            Ok(Signal::CtrlC) => {
                println!();
                continue;
            }
            Ok(Signal::CtrlD) => {
                println!("{}", "Exiting flatfs...".yellow());
                break;
            }
            Err(e) => {
                println!("Error reading line: {}", e);
                break;
            }
        }
    }

    println!("{}", "GoodBye!".bright_yellow());
}

fn banner() {
    let mut stdout = stdout();
    let _ = execute!(
        stdout,
        Clear(ClearType::All),
        cursor::MoveTo(0, 0),
        SetForegroundColor(Color::Cyan),
        Print(format!("flatfs v{}\n", env!("CARGO_PKG_VERSION"))),
        ResetColor
    );
}
