use std::fmt;

use tracing::debug;

use crate::error::NavigationError;

/// Every route the shell knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Screen {
    Welcome,
    Login,
    Home,
    Camera,
    Result,
    Instructions,
    Settings,
    History,
}

impl Screen {
    /// Entry screens reachable without a session.
    pub fn is_public(self) -> bool {
        matches!(self, Self::Welcome | Self::Login)
    }

    /// Parse a router segment. The camera lives at the index route.
    pub fn from_route(route: &str) -> Option<Self> {
        let screen = match route.trim_start_matches('/') {
            "welcome" => Self::Welcome,
            "login" => Self::Login,
            "home" => Self::Home,
            "" | "index" | "camera" => Self::Camera,
            "result" => Self::Result,
            "instructions" => Self::Instructions,
            "settings" => Self::Settings,
            "history" => Self::History,
            _ => return None,
        };
        Some(screen)
    }

    pub fn route(self) -> &'static str {
        match self {
            Self::Welcome => "welcome",
            Self::Login => "login",
            Self::Home => "home",
            Self::Camera => "index",
            Self::Result => "result",
            Self::Instructions => "instructions",
            Self::Settings => "settings",
            Self::History => "history",
        }
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.route())
    }
}

/// Router collaborator. Implemented by the host shell; [`StackNavigator`] is
/// the in-memory version.
pub trait Navigator: Send {
    /// `None` until the router has mounted its first screen.
    fn current_screen(&self) -> Option<Screen>;
    fn replace(&mut self, screen: Screen);
    fn push(&mut self, screen: Screen);
    fn back(&mut self) -> Result<(), NavigationError>;
}

/// Decide where the user must be sent, if anywhere.
///
/// | authenticated | on welcome/login | result          |
/// |---------------|------------------|-----------------|
/// | no            | yes              | stay            |
/// | no            | no               | `Welcome`       |
/// | yes           | yes              | `Home`          |
/// | yes           | no               | stay            |
///
/// An unresolved current screen is reported as [`NavigationError::Unresolved`]
/// and must be treated as "no decision", never as a redirect.
pub fn guard_redirect(
    is_authenticated: bool,
    current: Option<Screen>,
) -> Result<Option<Screen>, NavigationError> {
    let current = current.ok_or(NavigationError::Unresolved)?;
    let target = match (is_authenticated, current.is_public()) {
        (false, false) => Some(Screen::Welcome),
        (true, true) => Some(Screen::Home),
        _ => None,
    };
    Ok(target)
}

/// Evaluate the guard against the navigator and apply the redirect with
/// `replace`. Returns the screen redirected to, if any.
pub fn enforce_guard(navigator: &mut dyn Navigator, is_authenticated: bool) -> Option<Screen> {
    match guard_redirect(is_authenticated, navigator.current_screen()) {
        Ok(Some(target)) => {
            debug!(
                "Guard redirect {} -> {target} (authenticated: {is_authenticated})",
                navigator.current_screen().map_or("?", Screen::route)
            );
            navigator.replace(target);
            Some(target)
        }
        Ok(None) => None,
        Err(NavigationError::Unresolved) => {
            debug!("Guard skipped: router not ready");
            None
        }
    }
}

/// Route stack. An empty stack is the "router not mounted yet" state.
#[derive(Debug, Clone, Default)]
pub struct StackNavigator {
    stack: Vec<Screen>,
}

impl StackNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(screen: Screen) -> Self {
        Self {
            stack: vec![screen],
        }
    }

    pub fn stack(&self) -> &[Screen] {
        &self.stack
    }
}

impl Navigator for StackNavigator {
    fn current_screen(&self) -> Option<Screen> {
        self.stack.last().copied()
    }

    fn replace(&mut self, screen: Screen) {
        match self.stack.last_mut() {
            Some(top) => *top = screen,
            None => self.stack.push(screen),
        }
    }

    fn push(&mut self, screen: Screen) {
        self.stack.push(screen);
    }

    fn back(&mut self) -> Result<(), NavigationError> {
        if self.stack.len() < 2 {
            return Err(NavigationError::Unresolved);
        }
        self.stack.pop();
        Ok(())
    }
}
