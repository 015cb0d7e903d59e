//! The interactive record-management session.
//!
//! A menu loop over five actions. Update and delete re-list the collection
//! first and let the user pick a square by its 1-based display index, since
//! the store's identifiers are never typed by hand. Every failure prints one
//! line and returns to the menu; only terminal I/O errors end the session.

use tracing::{debug, warn};

use crate::bootstrap::{self, SeedOutcome};
use crate::error::{Error, Result};
use crate::render::{yes_no_answer, MessageLevel, Renderer};
use crate::square::{Square, SquareFields, DEFAULT_TEXT_COLOR};
use crate::storage::SquareStore;
use crate::terminal::Terminal;

const MENU_PROMPT: &str = "Enter your choice (1-5): ";

/// Where the session is in its menu loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Waiting for a menu choice.
    Menu,
    /// Showing every square.
    Listing,
    /// Collecting fields for a new square.
    Adding,
    /// Replacing the fields of a listed square.
    Updating,
    /// Removing a listed square.
    Deleting,
    /// Done; the loop has ended.
    Exit,
}

impl State {
    /// Map a menu answer to the state it selects.
    ///
    /// Surrounding whitespace is ignored. Returns `None` for anything that is
    /// not one of the five menu keys.
    #[must_use]
    pub fn from_choice(choice: &str) -> Option<Self> {
        match choice.trim() {
            "1" => Some(Self::Listing),
            "2" => Some(Self::Adding),
            "3" => Some(Self::Updating),
            "4" => Some(Self::Deleting),
            "5" => Some(Self::Exit),
            _ => None,
        }
    }
}

/// Whether the loop keeps going after a handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    EndOfInput,
}

/// Turn a 1-based display index into a position in a list of `len` squares.
#[must_use]
pub fn parse_display_index(input: &str, len: usize) -> Option<usize> {
    match input.trim().parse::<usize>() {
        Ok(n) if (1..=len).contains(&n) => Some(n - 1),
        _ => None,
    }
}

/// Parse a whole-number length.
#[must_use]
pub fn parse_length(input: &str) -> Option<i64> {
    input.trim().parse().ok()
}

/// True only for a case-insensitive "yes".
#[must_use]
pub fn is_yes(input: &str) -> bool {
    input.eq_ignore_ascii_case("yes")
}

/// Interactive session over a store and a terminal.
///
/// The session owns its terminal for its whole lifetime; dropping the session
/// releases it, whichever way the loop ended.
#[derive(Debug)]
pub struct Session<S, T> {
    store: S,
    terminal: T,
    renderer: Renderer,
    state: State,
}

impl<S: SquareStore, T: Terminal> Session<S, T> {
    /// Create a session at the menu.
    pub fn new(store: S, terminal: T, renderer: Renderer) -> Self {
        Self {
            store,
            terminal,
            renderer,
            state: State::Menu,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> State {
        self.state
    }

    /// The store the session writes to.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The terminal the session talks through.
    pub fn terminal(&self) -> &T {
        &self.terminal
    }

    /// Seed the store with the sample squares if it is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be counted or written, or the
    /// terminal fails.
    pub async fn seed(&mut self) -> Result<SeedOutcome> {
        let outcome = bootstrap::seed_if_empty(&self.store).await?;
        if let SeedOutcome::Seeded(_) = outcome {
            self.say(
                MessageLevel::Info,
                "Initializing database with sample squares...",
            )
            .await?;
            self.say(MessageLevel::Success, "Sample squares added successfully!")
                .await?;
        }
        Ok(outcome)
    }

    /// Run the menu loop until the user exits or input ends.
    ///
    /// # Errors
    ///
    /// Returns an error only if the terminal fails. Store failures are
    /// reported to the user and the loop continues.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            self.state = State::Menu;
            for line in self.renderer.menu() {
                self.terminal.write_line(&line).await?;
            }

            let Some(choice) = self.terminal.read_line(MENU_PROMPT).await? else {
                break;
            };

            let Some(next) = State::from_choice(&choice) else {
                self.say(
                    MessageLevel::Error,
                    "Invalid choice. Please enter a number between 1 and 5.",
                )
                .await?;
                continue;
            };

            debug!("Menu choice {:?}", next);
            self.state = next;
            let flow = match next {
                State::Listing => self.list().await.map(|_| Flow::Continue)?,
                State::Adding => self.add().await?,
                State::Updating => self.update().await?,
                State::Deleting => self.delete().await?,
                State::Exit | State::Menu => break,
            };
            if flow == Flow::EndOfInput {
                break;
            }
        }

        self.state = State::Exit;
        self.say(MessageLevel::Info, "Exiting application. Goodbye!")
            .await
    }

    async fn say(&mut self, level: MessageLevel, text: &str) -> Result<()> {
        let line = self.renderer.message(level, text);
        self.terminal.write_line(&line).await
    }

    async fn report_store_error(&mut self, err: &Error) -> Result<()> {
        warn!("Store call failed: {}", err);
        self.say(MessageLevel::Error, &format!("Error: {err}")).await
    }

    /// Fetch and print every square. `None` if the fetch failed (already reported).
    async fn list(&mut self) -> Result<Option<Vec<Square>>> {
        match self.store.list_all().await {
            Ok(squares) => {
                for line in self.renderer.listing(&squares) {
                    self.terminal.write_line(&line).await?;
                }
                Ok(Some(squares))
            }
            Err(e) => {
                self.report_store_error(&e).await?;
                Ok(None)
            }
        }
    }

    async fn add(&mut self) -> Result<Flow> {
        let section = self.renderer.section("ADD NEW SQUARE");
        self.terminal.write_line(&section).await?;

        let Some(length_input) = self.terminal.read_line("Enter length: ").await? else {
            return Ok(Flow::EndOfInput);
        };
        let Some(length) = parse_length(&length_input) else {
            self.reject_length(&length_input).await?;
            return Ok(Flow::Continue);
        };

        let Some(color) = self.terminal.read_line("Enter color: ").await? else {
            return Ok(Flow::EndOfInput);
        };
        let Some(filled) = self.terminal.read_line("Is filled? (yes/no): ").await? else {
            return Ok(Flow::EndOfInput);
        };
        let Some(text) = self.terminal.read_line("Enter text: ").await? else {
            return Ok(Flow::EndOfInput);
        };
        let Some(text_color) = self.terminal.read_line("Enter text color: ").await? else {
            return Ok(Flow::EndOfInput);
        };

        let text_color = if text_color.is_empty() {
            DEFAULT_TEXT_COLOR.to_string()
        } else {
            text_color
        };
        let fields = SquareFields::new(length, color)
            .filled(is_yes(&filled))
            .text(text)
            .text_color(text_color);

        match self.store.insert_one(&fields).await {
            Ok(id) => {
                debug!("Added square {}", id);
                self.say(MessageLevel::Success, "Square added successfully!")
                    .await?;
            }
            Err(e) => self.report_store_error(&e).await?,
        }
        Ok(Flow::Continue)
    }

    /// Re-list, then ask which square to act on.
    ///
    /// `Ok(None)` means nothing was selected and the menu should come back.
    async fn select(&mut self, title: &str, prompt: &str) -> Result<Option<Selection>> {
        let Some(squares) = self.list().await? else {
            return Ok(Some(Selection::Skip));
        };
        if squares.is_empty() {
            return Ok(Some(Selection::Skip));
        }

        let section = self.renderer.section(title);
        self.terminal.write_line(&section).await?;

        let Some(answer) = self.terminal.read_line(prompt).await? else {
            return Ok(None);
        };
        match parse_display_index(&answer, squares.len()) {
            Some(index) => Ok(Some(Selection::Square(squares[index].clone()))),
            None => {
                self.say(MessageLevel::Error, "Invalid square number.")
                    .await?;
                Ok(Some(Selection::Skip))
            }
        }
    }

    async fn update(&mut self) -> Result<Flow> {
        let square = match self
            .select("UPDATE SQUARE", "Enter the number of the square to update: ")
            .await?
        {
            None => return Ok(Flow::EndOfInput),
            Some(Selection::Skip) => return Ok(Flow::Continue),
            Some(Selection::Square(square)) => square,
        };
        let current = &square.fields;

        let summary = format!("Updating Square: {}", self.renderer.summary(current));
        self.terminal.write_line(&summary).await?;

        let prompt = self
            .renderer
            .prompt_with_current("Enter new length", &current.length.to_string());
        let Some(length_input) = self.terminal.read_line(&prompt).await? else {
            return Ok(Flow::EndOfInput);
        };
        let length = if length_input.trim().is_empty() {
            current.length
        } else if let Some(length) = parse_length(&length_input) {
            length
        } else {
            self.reject_length(&length_input).await?;
            return Ok(Flow::Continue);
        };

        let Some(color) = self
            .ask_keeping("Enter new color", &current.color)
            .await?
        else {
            return Ok(Flow::EndOfInput);
        };

        let prompt = self
            .renderer
            .prompt_with_current("Is filled? (yes/no)", yes_no_answer(current.is_filled));
        let Some(filled_input) = self.terminal.read_line(&prompt).await? else {
            return Ok(Flow::EndOfInput);
        };
        let is_filled = if filled_input.is_empty() {
            current.is_filled
        } else {
            is_yes(&filled_input)
        };

        let Some(text) = self.ask_keeping("Enter new text", &current.text).await? else {
            return Ok(Flow::EndOfInput);
        };
        let Some(text_color) = self
            .ask_keeping("Enter new text color", &current.text_color)
            .await?
        else {
            return Ok(Flow::EndOfInput);
        };

        let fields = SquareFields {
            length,
            color,
            is_filled,
            text,
            text_color,
        };

        match self.store.update_by_id(&square.id, &fields).await {
            Ok(true) => {
                self.say(MessageLevel::Success, "Square updated successfully!")
                    .await?;
            }
            Ok(false) => {
                warn!("Square {} vanished before update", square.id);
                self.say(MessageLevel::Warning, "Square not found.").await?;
            }
            Err(e) => self.report_store_error(&e).await?,
        }
        Ok(Flow::Continue)
    }

    async fn delete(&mut self) -> Result<Flow> {
        let square = match self
            .select("DELETE SQUARE", "Enter the number of the square to delete: ")
            .await?
        {
            None => return Ok(Flow::EndOfInput),
            Some(Selection::Skip) => return Ok(Flow::Continue),
            Some(Selection::Square(square)) => square,
        };

        let prompt = self.renderer.confirm_delete(&square.fields);
        let Some(answer) = self.terminal.read_line(&prompt).await? else {
            return Ok(Flow::EndOfInput);
        };
        if !is_yes(&answer) {
            self.say(MessageLevel::Info, "Deletion cancelled.").await?;
            return Ok(Flow::Continue);
        }

        match self.store.delete_by_id(&square.id).await {
            Ok(true) => {
                self.say(MessageLevel::Success, "Square deleted successfully!")
                    .await?;
            }
            Ok(false) => {
                warn!("Square {} vanished before delete", square.id);
                self.say(MessageLevel::Warning, "Square not found.").await?;
            }
            Err(e) => self.report_store_error(&e).await?,
        }
        Ok(Flow::Continue)
    }

    /// Ask for a text value; an empty answer keeps `current`.
    async fn ask_keeping(&mut self, label: &str, current: &str) -> Result<Option<String>> {
        let prompt = self.renderer.prompt_with_current(label, current);
        let answer = self.terminal.read_line(&prompt).await?;
        Ok(answer.map(|answer| {
            if answer.is_empty() {
                current.to_string()
            } else {
                answer
            }
        }))
    }

    async fn reject_length(&mut self, input: &str) -> Result<()> {
        self.say(
            MessageLevel::Error,
            &format!("Invalid length: '{}' is not a whole number.", input.trim()),
        )
        .await
    }
}

/// Result of the list-then-pick step.
#[derive(Debug)]
enum Selection {
    /// Nothing to act on; back to the menu.
    Skip,
    /// The square at the chosen display index.
    Square(Square),
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::logging::init_test_logging;
    use crate::square::SquareId;
    use crate::storage::SqliteStore;
    use crate::terminal::{ScriptedTerminal, StdTerminal};

    fn store() -> SqliteStore {
        init_test_logging();
        SqliteStore::open_in_memory("squares").unwrap()
    }

    async fn run_script(store: &SqliteStore, answers: &[&str]) -> ScriptedTerminal {
        let mut session = Session::new(
            store.clone(),
            ScriptedTerminal::new(answers.iter().copied()),
            Renderer::plain(),
        );
        session.run().await.unwrap();
        assert_eq!(session.state(), State::Exit);
        session.terminal().clone()
    }

    #[test]
    fn test_state_from_choice() {
        assert_eq!(State::from_choice("1"), Some(State::Listing));
        assert_eq!(State::from_choice(" 2 "), Some(State::Adding));
        assert_eq!(State::from_choice("3"), Some(State::Updating));
        assert_eq!(State::from_choice("4"), Some(State::Deleting));
        assert_eq!(State::from_choice("5"), Some(State::Exit));
        assert_eq!(State::from_choice("6"), None);
        assert_eq!(State::from_choice(""), None);
        assert_eq!(State::from_choice("list"), None);
    }

    #[test]
    fn test_parse_display_index_bounds() {
        assert_eq!(parse_display_index("0", 3), None);
        assert_eq!(parse_display_index("1", 3), Some(0));
        assert_eq!(parse_display_index("3", 3), Some(2));
        assert_eq!(parse_display_index("4", 3), None);
        assert_eq!(parse_display_index("-1", 3), None);
        assert_eq!(parse_display_index("two", 3), None);
        assert_eq!(parse_display_index("1", 0), None);
    }

    #[test]
    fn test_parse_length() {
        assert_eq!(parse_length("8"), Some(8));
        assert_eq!(parse_length(" 12 "), Some(12));
        assert_eq!(parse_length("-3"), Some(-3));
        assert_eq!(parse_length("8.5"), None);
        assert_eq!(parse_length("eight"), None);
        assert_eq!(parse_length(""), None);
    }

    #[test]
    fn test_is_yes() {
        assert!(is_yes("yes"));
        assert!(is_yes("Yes"));
        assert!(is_yes("YES"));
        assert!(!is_yes("y"));
        assert!(!is_yes("no"));
        assert!(!is_yes(""));
        assert!(!is_yes("yes please"));
    }

    #[tokio::test]
    async fn test_exit_choice() {
        let store = store();
        let terminal = run_script(&store, &["5"]).await;
        assert!(terminal.output().ends_with("Exiting application. Goodbye!"));
        assert_eq!(terminal.remaining(), 0);
    }

    #[tokio::test]
    async fn test_end_of_input_exits() {
        let store = store();
        let terminal = run_script(&store, &[]).await;
        assert!(terminal.output().contains("Goodbye!"));
    }

    #[tokio::test]
    async fn test_invalid_choice_stays_at_menu() {
        let store = store();
        let terminal = run_script(&store, &["9", "5"]).await;
        assert!(terminal
            .output()
            .contains("Invalid choice. Please enter a number between 1 and 5."));
        assert_eq!(terminal.remaining(), 0);
    }

    #[tokio::test]
    async fn test_list_empty_store() {
        let store = store();
        let terminal = run_script(&store, &["1", "5"]).await;
        assert!(terminal.output().contains("No squares found in the database."));
    }

    #[tokio::test]
    async fn test_add_square() {
        let store = store();
        let terminal =
            run_script(&store, &["2", "8", "purple", "no", "T", "orange", "5"]).await;

        assert!(terminal.output().contains("Square added successfully!"));
        let squares = store.list_all().await.unwrap();
        assert_eq!(squares.len(), 1);
        assert_eq!(
            squares[0].fields,
            SquareFields::new(8, "purple").text("T").text_color("orange")
        );
    }

    #[tokio::test]
    async fn test_add_uses_defaults_for_empty_answers() {
        let store = store();
        run_script(&store, &["2", "3", "gray", "", "", "", "5"]).await;

        let squares = store.list_all().await.unwrap();
        assert_eq!(squares[0].fields, SquareFields::new(3, "gray"));
    }

    #[tokio::test]
    async fn test_add_rejects_non_numeric_length() {
        let store = store();
        let terminal = run_script(&store, &["2", "big", "5"]).await;

        assert!(terminal
            .output()
            .contains("Invalid length: 'big' is not a whole number."));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_add_reports_validation_failure() {
        let store = store();
        let terminal = run_script(&store, &["2", "4", "", "yes", "x", "red", "5"]).await;

        assert!(terminal.output().contains("Error: color is required"));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_on_empty_store_returns_to_menu() {
        let store = store();
        let terminal = run_script(&store, &["3", "5"]).await;

        assert!(terminal.output().contains("No squares found in the database."));
        assert!(!terminal.output().contains("UPDATE SQUARE"));
    }

    #[tokio::test]
    async fn test_update_out_of_range_leaves_store_alone() {
        let store = store();
        bootstrap::seed_if_empty(&store).await.unwrap();
        let before = store.list_all().await.unwrap();

        let terminal = run_script(&store, &["3", "0", "3", "4", "5"]).await;

        assert_eq!(terminal.output().matches("Invalid square number.").count(), 2);
        assert_eq!(store.list_all().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_update_rejects_non_numeric_length() {
        let store = store();
        bootstrap::seed_if_empty(&store).await.unwrap();
        let before = store.list_all().await.unwrap();

        let terminal = run_script(&store, &["3", "2", "wide", "5"]).await;

        assert!(terminal.output().contains("Invalid length"));
        assert_eq!(store.list_all().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_update_shows_current_values_as_defaults() {
        let store = store();
        bootstrap::seed_if_empty(&store).await.unwrap();
        let before = store.list_all().await.unwrap();

        let terminal = run_script(&store, &["3", "1", "", "", "", "", "", "5"]).await;

        let output = terminal.output();
        assert!(output.contains("Enter new length (5): "));
        assert!(output.contains("Enter new color (red): "));
        assert!(output.contains("Is filled? (yes/no) (yes): "));
        assert!(output.contains("Enter new text (Square 1): "));
        assert!(output.contains("Enter new text color (white): "));
        assert!(output.contains("Square updated successfully!"));
        assert_eq!(store.list_all().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_undecodable_input_is_an_invalid_choice() {
        let store = store();
        let terminal = StdTerminal::from_io(&b"9\n\xff\xfe\n1\n5\n"[..], Vec::new());
        let mut session = Session::new(store, terminal, Renderer::plain());

        session.run().await.unwrap();

        assert_eq!(session.state(), State::Exit);
        let output = String::from_utf8_lossy(session.terminal().writer()).into_owned();
        assert_eq!(
            output
                .matches("Invalid choice. Please enter a number between 1 and 5.")
                .count(),
            2
        );
        assert!(output.contains("No squares found in the database."));
        assert!(output.ends_with("Exiting application. Goodbye!\n"));
    }

    #[tokio::test]
    async fn test_delete_cancelled() {
        let store = store();
        bootstrap::seed_if_empty(&store).await.unwrap();

        let terminal = run_script(&store, &["4", "2", "no", "5"]).await;

        assert!(terminal.output().contains("Deletion cancelled."));
        assert_eq!(store.count().await.unwrap(), 3);
    }

    /// Deletes `victim` from the store as soon as a prompt starting with
    /// `trigger` is shown, simulating another client racing the session.
    struct RacingTerminal {
        inner: ScriptedTerminal,
        store: SqliteStore,
        victim: SquareId,
        trigger: &'static str,
    }

    #[async_trait]
    impl Terminal for RacingTerminal {
        async fn write_line(&mut self, line: &str) -> Result<()> {
            self.inner.write_line(line).await
        }

        async fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
            if prompt.starts_with(self.trigger) {
                self.store.delete_by_id(&self.victim).await?;
            }
            self.inner.read_line(prompt).await
        }
    }

    async fn race(answers: &[&str], trigger: &'static str) -> (SqliteStore, String) {
        let store = store();
        let victim = store
            .insert_one(&SquareFields::new(1, "white"))
            .await
            .unwrap();
        let terminal = RacingTerminal {
            inner: ScriptedTerminal::new(answers.iter().copied()),
            store: store.clone(),
            victim,
            trigger,
        };

        let mut session = Session::new(store.clone(), terminal, Renderer::plain());
        session.run().await.unwrap();
        let output = session.terminal().inner.output();
        (store, output)
    }

    #[tokio::test]
    async fn test_delete_reports_vanished_square() {
        let (store, output) = race(&["4", "1", "yes", "5"], "Are you sure").await;

        assert!(output.contains("Square not found."));
        assert!(!output.contains("Square deleted successfully!"));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_reports_vanished_square() {
        let (store, output) = race(
            &["3", "1", "", "", "", "", "", "5"],
            "Enter new text color",
        )
        .await;

        assert!(output.contains("Square not found."));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_end_of_input_mid_add_writes_nothing() {
        let store = store();
        let terminal = run_script(&store, &["2", "8", "purple"]).await;

        assert!(terminal.output().contains("Goodbye!"));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_seed_prints_progress() {
        let store = store();
        let mut session = Session::new(
            store.clone(),
            ScriptedTerminal::new(Vec::<String>::new()),
            Renderer::plain(),
        );

        assert_eq!(session.seed().await.unwrap(), SeedOutcome::Seeded(3));
        assert_eq!(
            session.seed().await.unwrap(),
            SeedOutcome::AlreadyPopulated(3)
        );

        let output = session.terminal().output();
        assert_eq!(
            output
                .matches("Initializing database with sample squares...")
                .count(),
            1
        );
        assert_eq!(store.count().await.unwrap(), 3);
    }
}
