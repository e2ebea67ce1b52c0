use crate::shell::command::Command;

pub fn parse_command(input: &str) -> Result<Command, String> {
    let tokens: Vec<&str> = input.split_ascii_whitespace().collect();
    let Some((&cmd, args)) = tokens.split_first() else {
        return Err("Empty command".to_string());
    };

    let name = |usage: &str| {
        args.first()
            .map(|s| s.to_string())
            .ok_or_else(|| format!("No filename specified. Usage: {}", usage))
    };

    match cmd {
        "help" => Ok(Command::Help),
        "createfs" => name("createfs <image>").map(Command::CreateFs),
        "savefs" => Ok(Command::SaveFs),
        "open" => name("open <image>").map(Command::Open),
        "close" => Ok(Command::Close),
        "list" => match args.first() {
            None => Ok(Command::List { show_hidden: false }),
            Some(&"-h") => Ok(Command::List { show_hidden: true }),
            Some(other) => Err(format!("Unknown option for list: {}", other)),
        },
        "df" => Ok(Command::Df),
        "insert" => name("insert <file>").map(Command::Insert),
        "retrieve" => {
            let file = name("retrieve <name> [dest]")?;
            Ok(Command::Retrieve(file, args.get(1).map(|s| s.to_string())))
        }
        "attrib" => match args {
            [flag, file, ..] => {
                let enabled = match *flag {
                    "+h" => true,
                    "-h" => false,
                    other => return Err(format!("Unknown attribute: {}", other)),
                };
                Ok(Command::Attrib {
                    enabled,
                    name: file.to_string(),
                })
            }
            _ => Err("Usage: attrib +h|-h <name>".to_string()),
        },
        "stat" => name("stat <name>").map(Command::Stat),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(format!("Unknown command: {}", other)),
    }
}
