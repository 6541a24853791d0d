/// Commands listed by `/help` (command, description).
pub const COMMANDS: &[(&str, &str)] = &[
    ("/new", "Yeni soru yükle"),
    ("/image <yol>", "Dosyadan soru resmi yükle"),
    ("/paste", "Panodaki resmi yükle"),
    ("/like", "Çözümü beğen"),
    ("/fix", "Hatalı/eksik bildir ve yeniden çöz"),
    ("/retry", "Başarısız çözümü tekrar dene"),
    ("/logout", "Çıkış yap"),
    ("/help", "Komutları ve kısayolları göster"),
    ("/exit", "Uygulamadan çık"),
];

/// Slash commands recognized by the TUI.
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    /// Drop the current question and start over
    New,
    /// Load the question image from a file
    Image(String),
    /// Load the question image from the clipboard
    Paste,
    Like,
    /// Open the correction prompt
    Fix,
    Retry,
    Logout,
    Help,
    Exit,
}

/// Try to parse a slash command from user input.
/// Returns `None` if the input is not a recognized command.
pub fn parse(input: &str) -> Option<Command> {
    let trimmed = input.trim();
    let rest = trimmed.strip_prefix('/')?;
    let (cmd, arg) = match rest.split_once(' ') {
        Some((c, a)) => (c, Some(a.trim())),
        None => (rest, None),
    };
    match cmd {
        "new" | "yeni" | "clear" => Some(Command::New),
        "image" | "resim" => arg
            .filter(|a| !a.is_empty())
            .map(|a| Command::Image(a.to_string())),
        "paste" | "yapistir" => Some(Command::Paste),
        "like" | "begen" => Some(Command::Like),
        "fix" | "duzelt" => Some(Command::Fix),
        "retry" | "tekrar" => Some(Command::Retry),
        "logout" | "cikis" => Some(Command::Logout),
        "help" | "yardim" | "?" => Some(Command::Help),
        "exit" | "quit" => Some(Command::Exit),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_not_a_command() {
        assert_eq!(parse("neden x=2?"), None);
        assert_eq!(parse(""), None);
    }

    #[test]
    fn aliases() {
        assert_eq!(parse("/new"), Some(Command::New));
        assert_eq!(parse("  /yeni "), Some(Command::New));
        assert_eq!(parse("/quit"), Some(Command::Exit));
        assert_eq!(parse("/?"), Some(Command::Help));
        assert_eq!(parse("/begen"), Some(Command::Like));
    }

    #[test]
    fn image_needs_a_path() {
        assert_eq!(parse("/image"), None);
        assert_eq!(parse("/image   "), None);
        assert_eq!(
            parse("/image ~/soru 1.png"),
            Some(Command::Image("~/soru 1.png".into()))
        );
    }

    #[test]
    fn unknown_command() {
        assert_eq!(parse("/frobnicate"), None);
    }
}
