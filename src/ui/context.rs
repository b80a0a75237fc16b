//! Terminal detection for choosing fancy or plain output

use std::io::IsTerminal;

const CI_VARS: &[&str] = &[
    "CI",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "CIRCLECI",
    "BUILDKITE",
    "JENKINS_URL",
    "TF_BUILD",
];

/// How the current invocation talks to the user
#[derive(Debug, Clone)]
pub struct UiContext {
    interactive: bool,
    auto_yes: bool,
    json: bool,
}

impl UiContext {
    /// Detect the current environment
    pub fn detect() -> Self {
        Self {
            interactive: Self::detect_interactive(),
            auto_yes: false,
            json: false,
        }
    }

    /// Plain context for tests and scripted use
    pub fn non_interactive() -> Self {
        Self {
            interactive: false,
            auto_yes: false,
            json: false,
        }
    }

    /// Approve confirmations without asking
    pub fn with_auto_yes(mut self, yes: bool) -> Self {
        self.auto_yes = yes;
        self
    }

    /// Machine-readable mode: no spinners, no prompts
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        if json {
            self.interactive = false;
        }
        self
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn auto_yes(&self) -> bool {
        self.auto_yes
    }

    pub fn is_json(&self) -> bool {
        self.json
    }

    /// Spinners and colored boxes only on a real terminal
    pub fn use_fancy_output(&self) -> bool {
        self.interactive
    }

    fn detect_interactive() -> bool {
        if !std::io::stdout().is_terminal() || !std::io::stdin().is_terminal() {
            return false;
        }
        !CI_VARS.iter().any(|var| std::env::var_os(var).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_interactive_context() {
        let ctx = UiContext::non_interactive();
        assert!(!ctx.is_interactive());
        assert!(!ctx.auto_yes());
        assert!(!ctx.is_json());
    }

    #[test]
    fn json_disables_fancy_output() {
        let ctx = UiContext::detect().with_json(true).with_auto_yes(true);
        assert!(ctx.is_json());
        assert!(!ctx.use_fancy_output());
        assert!(ctx.auto_yes());
    }
}
