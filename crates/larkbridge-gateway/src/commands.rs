// SPDX-FileCopyrightText: 2026 Larkbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-chat control commands for group chats.
//!
//! When the bot is @-mentioned, the mention token is stripped and the
//! first remaining word is matched against `ls`, `bind`, and `help`.
//! Command replies are plain text and never reach the AI.

use std::sync::Arc;

use larkbridge_project::BindingStore;

/// A parsed @-mention command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupCommand {
    Ls,
    Bind(String),
    Help,
    /// First word was not a known command.
    Unknown(String),
    /// Mention with no text: shows help.
    Empty,
}

/// Parses the text of an @-mention message. The leading `@...` token is
/// stripped before matching.
pub fn parse_group_command(text: &str) -> GroupCommand {
    let trimmed = text.trim();
    let mut parts = trimmed.split_whitespace().peekable();

    if let Some(first) = parts.peek()
        && first.starts_with('@')
    {
        parts.next();
    }

    let Some(word) = parts.next() else {
        return GroupCommand::Empty;
    };

    match word {
        "ls" => GroupCommand::Ls,
        "help" => GroupCommand::Help,
        "bind" => {
            let arg: Vec<&str> = parts.collect();
            GroupCommand::Bind(arg.join(" "))
        }
        other => GroupCommand::Unknown(other.to_string()),
    }
}

/// Executes group commands against the binding store, producing the reply
/// text.
pub struct CommandHandler {
    bindings: Arc<BindingStore>,
}

impl CommandHandler {
    pub fn new(bindings: Arc<BindingStore>) -> Self {
        Self { bindings }
    }

    /// `ls`: numbered list of candidate project directories.
    pub fn handle_ls(&self) -> String {
        let projects = match self.bindings.list_projects() {
            Ok(projects) => projects,
            Err(e) => return format!("❌ Failed to list projects: {e}"),
        };

        if projects.is_empty() {
            return format!(
                "📂 No projects found\n\nNo directories under {}",
                self.bindings.base_dir().display()
            );
        }

        let mut reply = String::from("📂 Available projects:\n\n");
        for (i, project) in projects.iter().enumerate() {
            reply.push_str(&format!("{}. {}\n", i + 1, project));
        }
        reply.push_str(&format!(
            "\n{} project(s)\n\nUsage: @bot bind <N>",
            projects.len()
        ));
        reply
    }

    /// `bind <N|path>`: binds the chat to the Nth listed project or to an
    /// explicit path.
    pub fn handle_bind(&self, chat_id: &str, arg: &str) -> String {
        let arg = arg.trim();
        if arg.is_empty() {
            return "❌ Usage: @bot bind <N|path>\n\nExamples:\n@bot bind 1\n@bot bind ~/Desktop/code/my-app"
                .to_string();
        }

        let path = if arg.chars().all(|c| c.is_ascii_digit()) {
            let index: usize = match arg.parse() {
                Ok(index) => index,
                Err(e) => return format!("❌ Invalid index: {e}"),
            };
            let projects = match self.bindings.list_projects() {
                Ok(projects) => projects,
                Err(e) => return format!("❌ Failed to list projects: {e}"),
            };
            if index < 1 || index > projects.len() {
                return format!(
                    "❌ Index out of range\n\nValid range: 1-{}",
                    projects.len()
                );
            }
            projects[index - 1].clone()
        } else {
            arg.to_string()
        };

        match self.bindings.bind(chat_id, &path) {
            Ok(stored) => format!("✅ Project bound:\n\n{stored}"),
            Err(e) => format!("❌ Bind failed: {e}"),
        }
    }

    /// `help`: current binding plus a usage summary.
    pub fn handle_help(&self, chat_id: &str) -> String {
        let status = match self.bindings.get(chat_id) {
            Some(dir) => format!("📂 Current project:\n\n{dir}\n\n"),
            None => "📂 Current project: not bound (default directory)\n\n".to_string(),
        };

        status
            + "🤖 Claude bridge commands\n\n\
               📁 Projects:\n\
               \x20 @bot bind <N|path>   bind this chat to a project directory\n\
               \x20 @bot ls              list candidate projects with indexes\n\
               \x20 @bot help            show this help\n\n\
               💬 Chat:\n\
               \x20 plain messages (no @) are relayed to the AI\n\n\
               📝 When bound, the AI runs inside the project directory."
    }

    /// Reply for mentions whose first word is not a command.
    pub fn handle_unknown(&self) -> String {
        "❓ Unknown command\n\nSend `@bot help` to list available commands".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn handler_with_base(base: &std::path::Path) -> (CommandHandler, tempfile::TempDir) {
        let store_dir = tempdir().unwrap();
        let store = BindingStore::open(
            store_dir.path().join("projects.json").to_str().unwrap(),
            base.to_str().unwrap(),
        )
        .unwrap();
        (CommandHandler::new(Arc::new(store)), store_dir)
    }

    #[test]
    fn parse_strips_mention_token() {
        assert_eq!(parse_group_command("@bot ls"), GroupCommand::Ls);
        assert_eq!(parse_group_command("@_user_1 help"), GroupCommand::Help);
        assert_eq!(
            parse_group_command("@bot bind 2"),
            GroupCommand::Bind("2".into())
        );
        assert_eq!(
            parse_group_command("@bot bind ~/code/my app"),
            GroupCommand::Bind("~/code/my app".into())
        );
    }

    #[test]
    fn parse_without_mention_token() {
        assert_eq!(parse_group_command("ls"), GroupCommand::Ls);
        assert_eq!(parse_group_command("  help  "), GroupCommand::Help);
    }

    #[test]
    fn parse_unknown_and_empty() {
        assert_eq!(
            parse_group_command("@bot deploy prod"),
            GroupCommand::Unknown("deploy".into())
        );
        assert_eq!(parse_group_command("@bot"), GroupCommand::Empty);
        assert_eq!(parse_group_command("   "), GroupCommand::Empty);
    }

    #[test]
    fn ls_lists_numbered_projects() {
        let base = tempdir().unwrap();
        std::fs::create_dir(base.path().join("api")).unwrap();
        std::fs::create_dir(base.path().join("web")).unwrap();

        let (handler, _guard) = handler_with_base(base.path());
        let reply = handler.handle_ls();
        assert!(reply.contains("1. "), "got: {reply}");
        assert!(reply.contains("2. "), "got: {reply}");
        assert!(reply.contains("api"), "got: {reply}");
        assert!(reply.contains("web"), "got: {reply}");
    }

    #[test]
    fn ls_empty_base_reports_empty_list() {
        let base = tempdir().unwrap();
        let (handler, _guard) = handler_with_base(base.path());
        assert!(handler.handle_ls().contains("No projects found"));
    }

    #[test]
    fn bind_by_index_selects_sorted_entry() {
        let base = tempdir().unwrap();
        std::fs::create_dir(base.path().join("zebra")).unwrap();
        std::fs::create_dir(base.path().join("alpha")).unwrap();

        let (handler, _guard) = handler_with_base(base.path());
        let reply = handler.handle_bind("oc_1", "1");
        assert!(reply.starts_with('✅'), "got: {reply}");
        assert!(reply.contains("alpha"), "got: {reply}");
    }

    #[test]
    fn bind_index_out_of_range() {
        let base = tempdir().unwrap();
        std::fs::create_dir(base.path().join("only")).unwrap();

        let (handler, _guard) = handler_with_base(base.path());
        let reply = handler.handle_bind("oc_1", "5");
        assert!(reply.starts_with('❌'), "got: {reply}");
        assert!(reply.contains("1-1"), "got: {reply}");
    }

    #[test]
    fn bind_invalid_path_replies_error_and_keeps_store() {
        let base = tempdir().unwrap();
        let (handler, _guard) = handler_with_base(base.path());

        let reply = handler.handle_bind("oc_1", "/nonexistent");
        assert!(reply.starts_with('❌'), "got: {reply}");
        assert!(handler.bindings.get("oc_1").is_none());
    }

    #[test]
    fn bind_missing_arg_shows_usage() {
        let base = tempdir().unwrap();
        let (handler, _guard) = handler_with_base(base.path());
        assert!(handler.handle_bind("oc_1", "").contains("Usage"));
    }

    #[test]
    fn help_shows_current_binding() {
        let base = tempdir().unwrap();
        std::fs::create_dir(base.path().join("proj")).unwrap();
        let (handler, _guard) = handler_with_base(base.path());

        assert!(handler.handle_help("oc_1").contains("not bound"));

        handler.handle_bind("oc_1", "1");
        let reply = handler.handle_help("oc_1");
        assert!(reply.contains("proj"), "got: {reply}");
    }
}
