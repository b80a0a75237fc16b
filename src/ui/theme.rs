//! Prompt theme

use cliclack::ThemeState;
use console::Style;

/// Triplog's prompt theme, blue while active
#[derive(Debug, Clone, Default)]
pub struct TriplogTheme;

impl cliclack::Theme for TriplogTheme {
    fn bar_color(&self, state: &ThemeState) -> Style {
        match state {
            ThemeState::Active => Style::new().blue(),
            ThemeState::Error(_) => Style::new().red(),
            ThemeState::Cancel => Style::new().dim(),
            ThemeState::Submit => Style::new().blue().dim(),
        }
    }

    fn state_symbol_color(&self, state: &ThemeState) -> Style {
        match state {
            ThemeState::Active => Style::new().blue(),
            ThemeState::Error(_) => Style::new().red(),
            ThemeState::Cancel => Style::new().dim(),
            ThemeState::Submit => Style::new().green(),
        }
    }
}

/// Install the theme for every later prompt
pub fn init_theme() {
    cliclack::set_theme(TriplogTheme);
}

#[cfg(test)]
mod tests {
    use super::*;
    use cliclack::Theme;

    #[test]
    fn error_state_is_red() {
        let theme = TriplogTheme;
        let error = theme.bar_color(&ThemeState::Error("bad".into()));
        assert_eq!(
            error.apply_to("x").to_string(),
            Style::new().red().apply_to("x").to_string()
        );
        let _ = theme.state_symbol_color(&ThemeState::Submit);
    }
}
