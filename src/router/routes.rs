//! The console's static route table.
//!
//! Requirements are fixed when a route is registered. A child route always
//! carries its ancestors' requirements in addition to its own.

pub const APP_TITLE: &str = "Grape";
pub const HOME_PATH: &str = "/";
pub const LOGIN_PATH: &str = "/login";

/// What a destination demands of the session before it may be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RouteRequirement {
    pub requires_auth: bool,
    pub requires_admin: bool,
}

impl RouteRequirement {
    pub const PUBLIC: RouteRequirement = RouteRequirement {
        requires_auth: false,
        requires_admin: false,
    };
    pub const AUTHENTICATED: RouteRequirement = RouteRequirement {
        requires_auth: true,
        requires_admin: false,
    };
    pub const ADMIN: RouteRequirement = RouteRequirement {
        requires_auth: true,
        requires_admin: true,
    };

    /// The stricter of the two, field by field.
    pub fn inherit(self, parent: RouteRequirement) -> RouteRequirement {
        RouteRequirement {
            requires_auth: self.requires_auth || parent.requires_auth,
            requires_admin: self.requires_admin || parent.requires_admin,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteName {
    Home,
    Packages,
    PackageDetail,
    Login,
    Admin,
    AdminUsers,
    AdminSettings,
    NotFound,
}

/// A route as declared, possibly nested. Child paths are relative to the parent.
#[derive(Debug, Clone)]
pub struct RouteDef {
    pub name: RouteName,
    pub path: &'static str,
    pub title: Option<&'static str>,
    pub requirement: RouteRequirement,
    pub children: Vec<RouteDef>,
}

impl RouteDef {
    pub fn new(name: RouteName, path: &'static str, title: &'static str) -> Self {
        RouteDef {
            name,
            path,
            title: Some(title),
            requirement: RouteRequirement::PUBLIC,
            children: Vec::new(),
        }
    }

    pub fn requires(mut self, requirement: RouteRequirement) -> Self {
        self.requirement = requirement;
        self
    }

    pub fn with_children(mut self, children: Vec<RouteDef>) -> Self {
        self.children = children;
        self
    }
}

/// A registered route with its full pattern and effective requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub name: RouteName,
    pub pattern: String,
    pub title: Option<&'static str>,
    pub requirement: RouteRequirement,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

impl Route {
    fn new(
        name: RouteName,
        pattern: String,
        title: Option<&'static str>,
        requirement: RouteRequirement,
    ) -> Self {
        let segments = split_path(&pattern)
            .map(|segment| match segment.strip_prefix(':') {
                Some(param) => Segment::Param(param.to_string()),
                None => Segment::Literal(segment.to_string()),
            })
            .collect();
        Route {
            name,
            pattern,
            title,
            requirement,
            segments,
        }
    }

    /// `"<title> - Grape"`, or just the app name for untitled routes.
    pub fn document_title(&self) -> String {
        format!("{} - {}", self.title.unwrap_or(APP_TITLE), APP_TITLE)
    }

    /// Named parameters captured from `path`, if it matches this route.
    ///
    /// Literal segments compare ASCII case-insensitively.
    pub fn params(&self, path: &str) -> Option<Vec<(String, String)>> {
        let parts: Vec<&str> = split_path(strip_query(path)).collect();
        if parts.len() != self.segments.len() {
            return None;
        }
        let mut params = Vec::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) if literal.eq_ignore_ascii_case(part) => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    let value = urlencoding::decode(part)
                        .map(|v| v.into_owned())
                        .unwrap_or_else(|_| part.to_string());
                    params.push((name.clone(), value));
                }
            }
        }
        Some(params)
    }

    pub fn matches(&self, path: &str) -> bool {
        self.params(path).is_some()
    }
}

/// Flattened, immutable set of routes plus a catch-all for unknown paths.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
    not_found: Route,
}

impl RouteTable {
    pub fn new(defs: Vec<RouteDef>) -> Self {
        let mut routes = Vec::new();
        for def in defs {
            flatten(def, "", RouteRequirement::PUBLIC, &mut routes);
        }
        RouteTable {
            routes,
            not_found: Route::new(
                RouteName::NotFound,
                "/:pathMatch(.*)*".to_string(),
                Some("Not Found"),
                RouteRequirement::PUBLIC,
            ),
        }
    }

    /// The console's own routes.
    pub fn console() -> Self {
        RouteTable::new(vec![
            RouteDef::new(RouteName::Home, HOME_PATH, "Home"),
            RouteDef::new(RouteName::Packages, "/packages", "Packages"),
            RouteDef::new(RouteName::PackageDetail, "/package/:name", "Package"),
            RouteDef::new(RouteName::Login, LOGIN_PATH, "Login"),
            RouteDef::new(RouteName::Admin, "/admin", "Admin")
                .requires(RouteRequirement::ADMIN)
                .with_children(vec![
                    RouteDef::new(RouteName::AdminUsers, "users", "Users"),
                    RouteDef::new(RouteName::AdminSettings, "settings", "Settings"),
                ]),
        ])
    }

    /// First registered route matching `full_path`; query and fragment are ignored.
    pub fn resolve(&self, full_path: &str) -> &Route {
        self.routes
            .iter()
            .find(|route| route.matches(full_path))
            .unwrap_or(&self.not_found)
    }

    pub fn get(&self, name: RouteName) -> Option<&Route> {
        if name == RouteName::NotFound {
            return Some(&self.not_found);
        }
        self.routes.iter().find(|route| route.name == name)
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}

fn flatten(def: RouteDef, parent: &str, inherited: RouteRequirement, out: &mut Vec<Route>) {
    let pattern = join(parent, def.path);
    let requirement = def.requirement.inherit(inherited);
    out.push(Route::new(def.name, pattern.clone(), def.title, requirement));
    for child in def.children {
        flatten(child, &pattern, requirement, out);
    }
}

fn join(parent: &str, path: &str) -> String {
    if path.starts_with('/') {
        return path.to_string();
    }
    format!("{}/{}", parent.trim_end_matches('/'), path)
}

fn strip_query(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    &path[..end]
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_children_inherit_parent_requirements() {
        let table = RouteTable::console();
        let users = table.get(RouteName::AdminUsers).unwrap();
        assert_eq!(users.pattern, "/admin/users");
        assert_eq!(users.requirement, RouteRequirement::ADMIN);

        let packages = table.get(RouteName::Packages).unwrap();
        assert_eq!(packages.requirement, RouteRequirement::PUBLIC);
    }

    #[test]
    fn test_resolve_ignores_query_fragment_and_trailing_slash() {
        let table = RouteTable::console();
        assert_eq!(table.resolve("/").name, RouteName::Home);
        assert_eq!(table.resolve("/packages?q=pad").name, RouteName::Packages);
        assert_eq!(table.resolve("/admin/users/").name, RouteName::AdminUsers);
        assert_eq!(table.resolve("/admin#top").name, RouteName::Admin);
        assert_eq!(table.resolve("/admin/unknown").name, RouteName::NotFound);
        assert_eq!(table.resolve("/package").name, RouteName::NotFound);
    }

    #[test]
    fn test_literal_segments_ignore_case() {
        let table = RouteTable::console();
        let route = table.resolve("/Admin/Users");
        assert_eq!(route.name, RouteName::AdminUsers);
        assert_eq!(route.requirement, RouteRequirement::ADMIN);
        assert_eq!(table.resolve("/PACKAGES?q=x").name, RouteName::Packages);
        assert_eq!(route.params("/ADMIN/users"), Some(Vec::new()));
    }

    #[test]
    fn test_params_are_decoded() {
        let table = RouteTable::console();
        let route = table.resolve("/package/%40acme%2Fwidgets");
        assert_eq!(route.name, RouteName::PackageDetail);
        assert_eq!(
            route.params("/package/%40acme%2Fwidgets"),
            Some(vec![("name".to_string(), "@acme/widgets".to_string())])
        );
    }

    #[test]
    fn test_document_title() {
        let table = RouteTable::console();
        assert_eq!(table.resolve("/packages").document_title(), "Packages - Grape");
        let untitled = Route::new(
            RouteName::Home,
            "/".to_string(),
            None,
            RouteRequirement::PUBLIC,
        );
        assert_eq!(untitled.document_title(), "Grape - Grape");
    }

    #[test]
    fn test_absolute_child_path_is_kept() {
        let table = RouteTable::new(vec![RouteDef::new(RouteName::Admin, "/admin", "Admin")
            .requires(RouteRequirement::AUTHENTICATED)
            .with_children(vec![RouteDef::new(
                RouteName::AdminSettings,
                "/settings",
                "Settings",
            )
            .requires(RouteRequirement {
                requires_auth: false,
                requires_admin: true,
            })])]);
        let settings = table.get(RouteName::AdminSettings).unwrap();
        assert_eq!(settings.pattern, "/settings");
        assert_eq!(settings.requirement, RouteRequirement::ADMIN);
    }
}
