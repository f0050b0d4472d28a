use std::collections::BTreeSet;
use std::fmt;

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_STAFF: &str = "staff";

/// Roles a route accepts. Deduplicated on construction; the empty set means
/// any authenticated caller is permitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct AllowedRoleSet {
    roles: BTreeSet<String>,
}

impl AllowedRoleSet {
    /// No role restriction.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let roles = roles
            .into_iter()
            .filter_map(|role| {
                let role = role.as_ref().trim();
                if role.is_empty() {
                    None
                } else {
                    Some(role.to_string())
                }
            })
            .collect();
        Self { roles }
    }

    /// Parses a comma, semicolon or whitespace separated list.
    pub fn parse(value: &str) -> Self {
        Self::new(value.split(|c: char| c == ',' || c == ';' || c.is_whitespace()))
    }

    pub fn is_unrestricted(&self) -> bool {
        self.roles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    pub fn contains(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Whether a caller holding `role` may enter. An unrestricted set admits
    /// callers with no role claim at all.
    pub fn permits(&self, role: Option<&str>) -> bool {
        if self.is_unrestricted() {
            return true;
        }
        role.is_some_and(|role| self.contains(role))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.roles.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.roles.iter().cloned().collect()
    }
}

impl<S: AsRef<str>> FromIterator<S> for AllowedRoleSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl fmt::Display for AllowedRoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unrestricted() {
            return f.write_str("*");
        }
        let joined = self.iter().collect::<Vec<_>>().join(",");
        f.write_str(&joined)
    }
}
