use common_auth::{AllowedRoleSet, ROLE_ADMIN, ROLE_STAFF};

/// How a path is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteAccess {
    /// No guard (login, password reset, onboarding).
    Public,
    /// Guarded by the route guard with this role set.
    Protected(AllowedRoleSet),
    /// Static redirect to another path.
    Redirect(String),
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Param,
}

#[derive(Debug, Clone)]
struct RouteEntry {
    pattern: String,
    segments: Vec<Segment>,
    access: RouteAccess,
}

/// Ordered list of path patterns; `:name` segments match any single
/// segment. The first matching entry wins.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The learning application's views: learner pages need any session,
    /// the admin area needs `admin` or `staff`, staff management needs `admin`.
    pub fn application() -> Self {
        let learner = AllowedRoleSet::any();
        let back_office = AllowedRoleSet::new([ROLE_ADMIN, ROLE_STAFF]);
        let admin_only = AllowedRoleSet::new([ROLE_ADMIN]);

        let mut table = Self::new()
            .public("/login")
            .public("/forgot-password")
            .public("/welcome/:step");

        for path in [
            "/",
            "/grammar",
            "/video/:lessonId",
            "/speak/:lessonId",
            "/topics",
            "/topics/:topic",
            "/experience/ai-chat",
            "/profile",
            "/roadmaps",
            "/roadmaps/:id/days",
            "/days/:dayId",
        ] {
            table = table.protected(path, learner.clone());
        }

        table = table.protected("/admin/staff", admin_only);
        for path in [
            "/admin",
            "/admin/users",
            "/admin/reports",
            "/admin/messages",
            "/admin/calendar",
            "/admin/lessons",
            "/admin/roadmaps",
            "/admin/roadmaps/:roadmapId/days",
            "/admin/days/:dayId/activities",
        ] {
            table = table.protected(path, back_office.clone());
        }

        table.redirect("/dashboard", "/admin")
    }

    pub fn public(self, pattern: &str) -> Self {
        self.with(pattern, RouteAccess::Public)
    }

    pub fn protected(self, pattern: &str, allowed: AllowedRoleSet) -> Self {
        self.with(pattern, RouteAccess::Protected(allowed))
    }

    pub fn redirect(self, pattern: &str, target: impl Into<String>) -> Self {
        self.with(pattern, RouteAccess::Redirect(target.into()))
    }

    fn with(mut self, pattern: &str, access: RouteAccess) -> Self {
        let segments = split_path(pattern)
            .map(|segment| {
                if segment.starts_with(':') {
                    Segment::Param
                } else {
                    Segment::Static(segment.to_string())
                }
            })
            .collect();
        self.entries.push(RouteEntry {
            pattern: pattern.to_string(),
            segments,
            access,
        });
        self
    }

    /// Access rule for `path`; query strings and fragments are ignored.
    pub fn resolve(&self, path: &str) -> RouteAccess {
        self.find(path)
            .map(|entry| entry.access.clone())
            .unwrap_or(RouteAccess::NotFound)
    }

    /// Pattern that matched `path`, if any.
    pub fn matched_pattern(&self, path: &str) -> Option<&str> {
        self.find(path).map(|entry| entry.pattern.as_str())
    }

    fn find(&self, path: &str) -> Option<&RouteEntry> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let requested: Vec<&str> = split_path(path).collect();
        self.entries.iter().find(|entry| {
            entry.segments.len() == requested.len()
                && entry
                    .segments
                    .iter()
                    .zip(&requested)
                    .all(|(segment, actual)| match segment {
                        Segment::Param => true,
                        Segment::Static(expected) => expected == actual,
                    })
        })
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}
