/// Branch a build runs on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchContext {
    pub name: String,
}

impl BranchContext {
    pub fn new(name: impl Into<String>) -> Self {
        BranchContext { name: name.into() }
    }

    /// Branch name reduced to a single semver pre-release identifier
    ///
    /// Lowercases, maps every run of characters outside `[a-z0-9]` to one `-`,
    /// and trims dashes. An empty result (detached HEAD) becomes `detached`; an
    /// all-digit result is prefixed with `b` so it is never read as a number.
    pub fn prerelease_token(&self) -> String {
        let mut token = String::with_capacity(self.name.len());
        let mut pending_dash = false;

        for c in self.name.chars().flat_map(char::to_lowercase) {
            if c.is_ascii_alphanumeric() {
                if pending_dash && !token.is_empty() {
                    token.push('-');
                }
                pending_dash = false;
                token.push(c);
            } else {
                pending_dash = true;
            }
        }

        if token.is_empty() {
            return "detached".to_string();
        }
        if token.chars().all(|c| c.is_ascii_digit()) {
            return format!("b{}", token);
        }
        token
    }
}
