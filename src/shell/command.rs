use colored::*;
use dialoguer::Confirm;
use flatfs::{FilesystemImage, InodeAttributes};
use indicatif::{ProgressBar, ProgressStyle};
use std::{error::Error, path::Path, time::Duration};

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Help,
    CreateFs(String),
    SaveFs,
    Open(String),
    Close,
    List { show_hidden: bool },
    Df,
    Insert(String),
    Retrieve(String, Option<String>),
    Attrib { enabled: bool, name: String },
    Stat(String),
    Quit,
}

/// 命令执行后 shell 是否继续
pub enum Flow {
    Continue,
    Exit,
}

impl Command {
    /// 会让当前镜像中未保存的修改丢失的命令
    pub fn discards_image(&self) -> bool {
        matches!(
            self,
            Command::CreateFs(_) | Command::Open(_) | Command::Close | Command::Quit
        )
    }
}

pub fn execute_command(
    cmd: &Command,
    image: &mut FilesystemImage,
) -> Result<Flow, Box<dyn Error>> {
    if cmd.discards_image() && !discard_changes_ok(image)? {
        return Ok(Flow::Continue);
    }

    match cmd {
        Command::Help => print_help(),
        Command::CreateFs(name) => {
            if Path::new(name).exists()
                && !confirm(&format!("{} already exists. Overwrite it?", name))?
            {
                return Ok(Flow::Continue);
            }
            with_spinner("Creating image...", || image.create_image(name))?;
            println!("💾 Created image {}", name.green());
        }
        Command::SaveFs => {
            with_spinner("Saving image...", || image.save_image())?;
            println!("✅ Image saved");
        }
        Command::Open(name) => {
            with_spinner("Opening image...", || image.load_image(name))?;
            println!("📂 Opened image {}", name.cyan());
        }
        Command::Close => {
            image.close_image()?;
            println!("Image closed");
        }
        Command::List { show_hidden } => {
            let entries = image.entries()?;
            let visible: Vec<_> = entries
                .iter()
                .filter(|e| *show_hidden || !e.attributes.contains(InodeAttributes::HIDDEN))
                .collect();
            if visible.is_empty() {
                println!("{}", "list: No files found.".bright_black());
            }
            for entry in visible {
                println!("📄  {}", entry.name);
            }
        }
        Command::Df => {
            println!("{} bytes free", image.free_space()?);
        }
        Command::Insert(path) => {
            image.insert_file(path)?;
            println!("📝 Inserted {}", path.green());
        }
        Command::Retrieve(name, dest) => {
            let dest = dest.as_deref().unwrap_or(name);
            let written = image.retrieve_file(name, dest)?;
            println!("📖 Retrieved {} ({} bytes) -> {}", name, written, dest.cyan());
        }
        Command::Attrib { enabled, name } => {
            image.set_attribute(name, InodeAttributes::HIDDEN, *enabled)?;
            let state = if *enabled { "hidden" } else { "visible" };
            println!("{} is now {}", name, state.yellow());
        }
        Command::Stat(name) => {
            let info = image.file_info(name)?;
            println!(
                "{}\n{}: {}\n{}: {}\n{}: {} bytes\n{}: {:?}\n{}: {}",
                "📊 File Info".bright_yellow().bold(),
                "Name".blue(),
                info.name,
                "Inode".blue(),
                info.inode,
                "Size".blue(),
                info.size,
                "Blocks".blue(),
                info.blocks,
                "Hidden".blue(),
                info.attributes.contains(InodeAttributes::HIDDEN)
            );
        }
        Command::Quit => {
            println!("{}", "👋 Exiting flatfs shell...".yellow().bold());
            return Ok(Flow::Exit);
        }
    }

    Ok(Flow::Continue)
}

fn confirm(prompt: &str) -> Result<bool, Box<dyn Error>> {
    Ok(Confirm::new().with_prompt(prompt).default(false).interact()?)
}

// 关闭或切换镜像前，如有未保存的修改先确认
fn discard_changes_ok(image: &FilesystemImage) -> Result<bool, Box<dyn Error>> {
    if !image.has_unsaved_changes() {
        return Ok(true);
    }
    confirm("The image has unsaved changes. Discard them?")
}

fn with_spinner<T, E>(msg: &'static str, op: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg);
    pb.enable_steady_tick(Duration::from_millis(80));
    let result = op();
    pb.finish_and_clear();
    result
}

fn print_help() {
    println!("{}", "📘 flatfs Commands".bright_cyan().bold());
    println!(
        "{}",
        "
  createfs <image>        Create a new empty image
  savefs                  Write the open image back to its file
  open <image>            Open an existing image
  close                   Close the open image (does not save)
  list [-h]               List files (-h includes hidden files)
  df                      Show free space in bytes
  insert <file>           Copy a host file into the image
  retrieve <name> [dest]  Copy a file out of the image
  attrib +h|-h <name>     Set or clear the hidden attribute
  stat <name>             Show file info
  help                    Show this help message
  quit                    Quit the shell
"
        .bright_black()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_that_drop_the_open_image_ask_first() {
        for cmd in [
            Command::CreateFs("disk.img".into()),
            Command::Open("disk.img".into()),
            Command::Close,
            Command::Quit,
        ] {
            assert!(cmd.discards_image(), "{:?}", cmd);
        }
        for cmd in [
            Command::SaveFs,
            Command::Df,
            Command::Insert("a.txt".into()),
            Command::List { show_hidden: false },
        ] {
            assert!(!cmd.discards_image(), "{:?}", cmd);
        }
    }

    #[test]
    fn clean_image_needs_no_confirmation() {
        let image = FilesystemImage::new();
        assert!(discard_changes_ok(&image).unwrap());
    }
}
