//! Centralized keybindings
//!
//! Single source of truth for the key hints shown in the footer.

/// Key hint with its label
#[derive(Debug, Clone)]
pub struct NavigationCommand {
    /// The keybinding string (e.g., "j/k", "Enter")
    pub key: &'static str,
    pub label: &'static str,
    /// Hidden in read-only mode
    pub mutates: bool,
}

impl NavigationCommand {
    pub const fn new(key: &'static str, label: &'static str) -> Self {
        Self {
            key,
            label,
            mutates: false,
        }
    }

    pub const fn mutating(key: &'static str, label: &'static str) -> Self {
        Self {
            key,
            label,
            mutates: true,
        }
    }
}

/// Footer hints in display order
pub fn get_navigation_commands(read_only: bool) -> Vec<NavigationCommand> {
    [
        NavigationCommand::new("j/k", "Move"),
        NavigationCommand::new("Enter", "Select cluster"),
        NavigationCommand::new("Tab", "Switch pane"),
        NavigationCommand::new("s", "Severity"),
        NavigationCommand::mutating("a", "Accept"),
        NavigationCommand::mutating("x", "Reject"),
        NavigationCommand::new("r", "Refresh"),
        NavigationCommand::new("q", "Quit"),
    ]
    .into_iter()
    .filter(|cmd| !(read_only && cmd.mutates))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_only_hides_mutating_keys() {
        let keys: Vec<&str> = get_navigation_commands(true).iter().map(|c| c.key).collect();
        assert!(!keys.contains(&"a"));
        assert!(!keys.contains(&"x"));
        assert!(keys.contains(&"r"));
        assert_eq!(get_navigation_commands(false).len(), 8);
    }
}
