// Console styling for the command-line tool.
use console::{style, Emoji};

pub static CHECK: Emoji<'static, 'static> = Emoji("✓", "v");
pub static ARROW: Emoji<'static, 'static> = Emoji("▶", ">");

pub fn check_icon() -> String {
  success(CHECK.to_string())
}

pub fn bold<T: AsRef<str>>(text: T) -> String {
  style(text.as_ref()).bold().to_string()
}

pub fn underline<T: AsRef<str>>(text: T) -> String {
  style(text.as_ref()).underlined().to_string()
}

pub fn error<T: AsRef<str>>(text: T) -> String {
  style(text.as_ref()).red().to_string()
}

pub fn warning<T: AsRef<str>>(text: T) -> String {
  style(text.as_ref()).color256(214).bold().to_string()
}

pub fn success<T: AsRef<str>>(text: T) -> String {
  style(text.as_ref()).green().to_string()
}

pub fn highlight<T: AsRef<str>>(text: T) -> String {
  style(text.as_ref()).blue().bold().to_string()
}

pub fn light<T: AsRef<str>>(text: T) -> String {
  style(text.as_ref()).color256(245).to_string()
}

// Horizontal rule used between sections of the tool's output
pub fn rule(double: bool) -> String {
  if double { "=".repeat(72) } else { "-".repeat(72) }
}

// Header printed when the tool starts
pub fn banner(title: &str, version: &str, about: &str, authors: &str) -> String {
  format!(
    "\n{} {}\n{}\n{}\nPart of a {} project.\n\nAuthors:\n{}\n{}\n",
    highlight(title),
    version,
    rule(false),
    about,
    highlight("physical-geomorphometry"),
    authors,
    rule(true)
  )
}

// One planned output: the statistic title and the file it lands in
pub fn output_entry(title: &str, path: &str) -> String {
  format!("{}\n  {}", title, light(format!("└─{} {}", ARROW, path)))
}
