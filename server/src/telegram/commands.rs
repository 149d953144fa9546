/// A chat message as the bot understands it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    /// `/link <CODE>`; the code is absent when the user sent no argument.
    Link(Option<String>),
    /// `/menu <text>`; the text may be empty.
    Menu(&'a str),
    Publish,
    Status,
    Unknown,
    /// Anything that is not a command is today's menu text.
    Text(&'a str),
}

impl<'a> Command<'a> {
    pub fn parse(text: &'a str) -> Self {
        let text = text.trim();
        if !text.starts_with('/') {
            return Command::Text(text);
        }

        let (head, rest) = text
            .split_once(char::is_whitespace)
            .unwrap_or((text, ""));
        // Group chats address commands as `/menu@SomeBot`.
        let name = head.split('@').next().unwrap_or(head);

        match name {
            "/link" => Command::Link(rest.split_whitespace().next().map(str::to_uppercase)),
            "/menu" => Command::Menu(rest.trim()),
            "/publish" => Command::Publish,
            "/status" => Command::Status,
            _ => Command::Unknown,
        }
    }
}
