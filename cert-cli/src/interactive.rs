//! Interactive CLI Mode
//!
//! Keeps one service alive across commands, so certificates issued against
//! the local backend stay available for the rest of the session.

use cert_db::{CertificateService, HealthMonitor};
use clap::Parser;
use std::io::{self, Write};

use crate::commands::{execute, CmdResult, Command, Identity};
use crate::print_error;

const PROMPT: &str = "certctl> ";
const MAX_HISTORY: usize = 1000;

/// Command history for interactive mode
pub struct CommandHistory {
    entries: Vec<String>,
    max_size: usize,
}

impl CommandHistory {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_size,
        }
    }

    /// Add a command, skipping blanks and repeats of the last one
    pub fn add(&mut self, command: &str) {
        let command = command.trim();
        if command.is_empty() || self.entries.last().map(String::as_str) == Some(command) {
            return;
        }
        self.entries.push(command.to_string());
        if self.entries.len() > self.max_size {
            self.entries.remove(0);
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Get the last N entries
    pub fn last_n(&self, n: usize) -> &[String] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }
}

/// One line of shell input, parsed with the same subcommands as the binary
#[derive(Parser, Debug)]
#[command(no_binary_name = true, name = "certctl")]
struct ShellLine {
    #[command(subcommand)]
    command: Command,
}

/// Result of executing a built-in command
#[derive(Debug, PartialEq, Eq)]
pub enum BuiltinResult {
    Handled,
    Empty,
    Exit,
}

/// Interactive session state
pub struct InteractiveSession {
    pub history: CommandHistory,
    pub identity: Identity,
    monitor: Option<HealthMonitor>,
    running: bool,
}

impl InteractiveSession {
    pub fn new(identity: Identity, monitor: Option<HealthMonitor>) -> Self {
        Self {
            history: CommandHistory::new(MAX_HISTORY),
            identity,
            monitor,
            running: true,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Print the prompt and read a line; `None` at end of input
    pub fn read_line(&self) -> io::Result<Option<String>> {
        print!("{}", PROMPT);
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            return Ok(None);
        }
        Ok(Some(input.trim().to_string()))
    }

    pub fn print_help(&self) {
        println!("Session commands:");
        println!();
        println!("  help, ?            - Show this help message");
        println!("  history [-n <n>]   - Show command history (last n entries)");
        println!("  status             - Show identity and backend health");
        println!("  as <role> <id>     - Act as another caller");
        println!("  exit, quit, q      - Leave the session");
        println!();
        println!("Certificate commands:");
        println!("  create -f key=value ...");
        println!("  get <id>");
        println!("  list [--student <studentId>]");
        println!("  update <id> -f key=value ...");
        println!("  delete <id>");
        println!("  verify <id> -f key=value ...");
        println!("  history <id>");
        println!("  init");
        println!("  health");
    }

    fn print_status(&self) {
        println!("Acting as: {}", self.identity);
        match self.monitor.as_ref().and_then(|p| p.latest()) {
            Some(status) => println!(
                "Backend: {} ({})",
                status.backend,
                if status.available { "available" } else { "unavailable" }
            ),
            None => println!("Backend health: not checked yet, use 'health'"),
        }
        println!("History entries: {}", self.history.entries().len());
    }

    /// Handle a session command; `None` if the line is a certificate command
    pub fn execute_builtin(&mut self, input: &str) -> Option<BuiltinResult> {
        let parts: Vec<&str> = input.split_whitespace().collect();
        if parts.is_empty() {
            return Some(BuiltinResult::Empty);
        }

        match parts[0] {
            "help" | "?" => {
                self.print_help();
                Some(BuiltinResult::Handled)
            }
            // `history <id>` is the certificate command
            "history" if parts.len() == 1 || parts[1] == "-n" => {
                let n = match parts.get(2).map(|s| s.parse::<usize>()) {
                    None if parts.len() == 1 => 10,
                    Some(Ok(n)) if parts.len() == 3 => n,
                    _ => {
                        println!("Usage: history [-n <count>]");
                        return Some(BuiltinResult::Handled);
                    }
                };
                let entries = self.history.last_n(n);
                println!("Last {} commands:", entries.len());
                for (i, entry) in entries.iter().enumerate() {
                    println!("  {}: {}", entries.len() - i, entry);
                }
                Some(BuiltinResult::Handled)
            }
            "status" => {
                self.print_status();
                Some(BuiltinResult::Handled)
            }
            "as" => {
                if parts.len() != 3 {
                    println!("Usage: as <role> <id>");
                } else {
                    self.identity = Identity::new(Some(parts[1].to_string()), Some(parts[2].to_string()));
                    println!("Acting as: {}", self.identity);
                }
                Some(BuiltinResult::Handled)
            }
            "exit" | "quit" | "q" => {
                self.stop();
                Some(BuiltinResult::Exit)
            }
            _ => None,
        }
    }
}

/// Split a line into arguments, honouring quotes and backslash escapes
pub fn parse_interactive_args(input: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut escape_next = false;

    for c in input.chars() {
        if escape_next {
            current.push(c);
            escape_next = false;
            continue;
        }

        match c {
            '\\' => escape_next = true,
            '"' | '\'' if quote.is_none() => quote = Some(c),
            c if quote == Some(c) => quote = None,
            ' ' | '\t' if quote.is_none() => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }

    if !current.is_empty() {
        args.push(current);
    }
    args
}

/// Run the read-eval-print loop until exit or end of input
pub async fn run(service: &CertificateService, session: &mut InteractiveSession) -> CmdResult<()> {
    println!(
        "certctl interactive mode ({} backend). Type 'help' for commands.",
        service.backend()
    );

    while session.is_running() {
        let line = match session.read_line()? {
            Some(line) => line,
            None => break,
        };
        session.history.add(&line);

        match session.execute_builtin(&line) {
            Some(BuiltinResult::Exit) => break,
            Some(_) => continue,
            None => {}
        }

        let parsed = match ShellLine::try_parse_from(parse_interactive_args(&line)) {
            Ok(parsed) => parsed,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        match execute(service, &session.identity, parsed.command).await {
            Ok(output) => println!("{}", serde_json::to_string_pretty(&output)?),
            Err(e) => print_error(e.as_ref()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> InteractiveSession {
        InteractiveSession::new(Identity::new(Some("admin".to_string()), Some("ADMIN1".to_string())), None)
    }

    #[test]
    fn test_command_history() {
        let mut history = CommandHistory::new(2);
        history.add("get CERT1");
        history.add("get CERT1");
        history.add("  ");
        history.add("list");
        history.add("health");

        assert_eq!(history.entries(), &["list".to_string(), "health".to_string()]);
        assert_eq!(history.last_n(1), &["health".to_string()]);
    }

    #[test]
    fn test_parse_args_quotes() {
        let args = parse_interactive_args("create -f \"studentName=Alice Johnson\" -f 'course=Data Science'");
        assert_eq!(
            args,
            vec!["create", "-f", "studentName=Alice Johnson", "-f", "course=Data Science"]
        );

        let args = parse_interactive_args("update CERT1 -f \"studentName=O'Brien\"");
        assert_eq!(args, vec!["update", "CERT1", "-f", "studentName=O'Brien"]);
    }

    #[test]
    fn test_shell_line_parses_commands() {
        let line = ShellLine::try_parse_from(parse_interactive_args("verify CERT1 -f grade=A")).unwrap();
        match line.command {
            Command::Verify { id, fields } => {
                assert_eq!(id, "CERT1");
                assert_eq!(fields, vec![("grade".to_string(), "A".to_string())]);
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert!(ShellLine::try_parse_from(parse_interactive_args("frobnicate")).is_err());
    }

    #[test]
    fn test_builtin_history_vs_certificate_history() {
        let mut session = session();
        assert_eq!(session.execute_builtin("history"), Some(BuiltinResult::Handled));
        assert_eq!(session.execute_builtin("history -n 5"), Some(BuiltinResult::Handled));
        assert_eq!(session.execute_builtin("history -n"), Some(BuiltinResult::Handled));
        assert_eq!(session.execute_builtin("history CERT1"), None);
        // numeric certificate ids reach the certificate command
        assert_eq!(session.execute_builtin("history 12345"), None);
        let line = ShellLine::try_parse_from(parse_interactive_args("history 12345")).unwrap();
        assert!(matches!(line.command, Command::History { id } if id == "12345"));
    }

    #[test]
    fn test_builtin_as_switches_identity() {
        let mut session = session();
        session.execute_builtin("as student STU001");
        assert_eq!(session.identity.role.as_deref(), Some("student"));
        assert_eq!(session.identity.id, "STU001");
    }

    #[test]
    fn test_builtin_exit() {
        let mut session = session();
        assert_eq!(session.execute_builtin("exit"), Some(BuiltinResult::Exit));
        assert!(!session.is_running());
        assert_eq!(session.execute_builtin(""), Some(BuiltinResult::Empty));
    }
}
