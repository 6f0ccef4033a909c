//! What the user is looking at: selection, tab, search and auth screen.

use mozzi_aggregation::ScoredLocation;
use mozzi_auth::{Session, User};
use mozzi_location_models::LocationId;
use mozzi_map::MapEvent;
use strum_macros::{AsRefStr, Display, EnumString};

use crate::recommend;

/// Header name while browsing without an account.
pub const ANONYMOUS_NAME: &str = "둘러보기 모드";

/// Header name for a user without a usable email.
pub const FALLBACK_NAME: &str = "사용자";

/// Bottom navigation tabs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Tab {
    /// Selected place card, ratings and recommendations.
    #[default]
    Home,
    /// Map of every place.
    Map,
    /// Add-place form.
    Add,
}

impl Tab {
    /// All tabs in navigation order.
    pub const ALL: [Self; 3] = [Self::Home, Self::Map, Self::Add];
}

/// Which authentication screen is shown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum AuthScreen {
    /// Sign-in form.
    #[default]
    Login,
    /// Sign-up form.
    SignUp,
    /// The app itself, signed in or browsing.
    App,
}

/// Header name for the current user.
#[must_use]
pub fn display_name(user: Option<&User>) -> &str {
    user.map_or(ANONYMOUS_NAME, |u| u.display_name().unwrap_or(FALLBACK_NAME))
}

/// View state for one client.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    selected_id: Option<LocationId>,
    tab: Tab,
    search: String,
    auth_screen: AuthScreen,
    auth_message: Option<String>,
    user: Option<User>,
}

impl ViewState {
    /// Starts on the login screen with nothing selected.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The location on the home card: the selected one if it still
    /// exists, else the first in the list.
    #[must_use]
    pub fn selected<'a>(&self, locations: &'a [ScoredLocation]) -> Option<&'a ScoredLocation> {
        self.selected_id
            .as_ref()
            .and_then(|id| locations.iter().find(|l| l.id() == id))
            .or_else(|| locations.first())
    }

    /// Selects a location without changing tabs.
    pub fn select(&mut self, id: LocationId) {
        self.selected_id = Some(id);
    }

    /// Selects a freshly created place and returns to the home tab.
    pub fn place_added(&mut self, id: LocationId) {
        self.selected_id = Some(id);
        self.tab = Tab::Home;
    }

    /// Applies a map interaction.
    pub fn handle_map_event(&mut self, event: MapEvent) {
        match event {
            MapEvent::Selected(id) => self.select(id),
        }
    }

    /// Active tab.
    #[must_use]
    pub const fn tab(&self) -> Tab {
        self.tab
    }

    /// Switches tabs.
    pub const fn set_tab(&mut self, tab: Tab) {
        self.tab = tab;
    }

    /// Current search text.
    #[must_use]
    pub fn search_text(&self) -> &str {
        &self.search
    }

    /// Replaces the search text.
    pub fn set_search(&mut self, query: impl Into<String>) {
        self.search = query.into();
    }

    /// Matches for the current search text.
    #[must_use]
    pub fn search_results<'a>(&self, locations: &'a [ScoredLocation]) -> Vec<&'a ScoredLocation> {
        recommend::search(locations, &self.search)
    }

    /// Picks a search result: selects it, clears the query and goes home.
    pub fn choose_search_result(&mut self, id: LocationId) {
        self.selected_id = Some(id);
        self.search.clear();
        self.tab = Tab::Home;
    }

    /// Quieter places other than the one on the home card.
    #[must_use]
    pub fn recommendations<'a>(&self, locations: &'a [ScoredLocation]) -> Vec<&'a ScoredLocation> {
        let selected = self.selected(locations).map(ScoredLocation::id);
        recommend::recommendations(locations, selected)
    }

    /// Current auth screen.
    #[must_use]
    pub const fn auth_screen(&self) -> AuthScreen {
        self.auth_screen
    }

    /// Message under the auth form, or the last gating prompt.
    #[must_use]
    pub fn auth_message(&self) -> Option<&str> {
        self.auth_message.as_deref()
    }

    /// Sets the auth message.
    pub fn set_auth_message(&mut self, message: impl Into<String>) {
        self.auth_message = Some(message.into());
    }

    /// Switches between the login and sign-up forms, clearing the message.
    pub fn toggle_auth_form(&mut self) {
        self.auth_screen = match self.auth_screen {
            AuthScreen::Login => AuthScreen::SignUp,
            AuthScreen::SignUp | AuthScreen::App => AuthScreen::Login,
        };
        self.auth_message = None;
    }

    /// Enters the app without signing in.
    pub const fn browse(&mut self) {
        self.auth_screen = AuthScreen::App;
    }

    /// Applies a session change. A session always lands in the app;
    /// signing out keeps the current screen and browses anonymously.
    pub fn on_session(&mut self, session: Option<&Session>) {
        self.user = session.map(|s| s.user.clone());
        if self.user.is_some() {
            self.auth_screen = AuthScreen::App;
        }
    }

    /// Signed-in user, if any.
    #[must_use]
    pub const fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Whether nobody is signed in.
    #[must_use]
    pub const fn is_anonymous(&self) -> bool {
        self.user.is_none()
    }

    /// Header name for the current user.
    #[must_use]
    pub fn display_name(&self) -> &str {
        display_name(self.user.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mozzi_aggregation::score_all;
    use mozzi_location_models::Location;

    fn row(id: &str, name: &str) -> Location {
        Location {
            id: LocationId::from(id),
            name: name.to_string(),
            latitude: 33.4,
            longitude: 126.5,
            address: None,
            category: None,
            dist: None,
            crowd_sum: None,
            crowd_count: None,
            parking_sum: None,
            parking_count: None,
        }
    }

    fn session(email: Option<&str>) -> Session {
        Session {
            access_token: "t".to_string(),
            refresh_token: None,
            expires_at: None,
            user: User {
                id: "u".to_string(),
                email: email.map(String::from),
            },
        }
    }

    #[test]
    fn selection_falls_back_to_first() {
        let list = score_all(vec![row("1", "애월 해변"), row("2", "성산 일출봉")]);
        let mut view = ViewState::new();
        assert_eq!(view.selected(&list).unwrap().id().as_str(), "1");

        view.select(LocationId::from("2"));
        assert_eq!(view.selected(&list).unwrap().id().as_str(), "2");

        view.select(LocationId::from("gone"));
        assert_eq!(view.selected(&list).unwrap().id().as_str(), "1");
        assert!(view.selected(&[]).is_none());
    }

    #[test]
    fn choosing_search_result_resets_query_and_tab() {
        let list = score_all(vec![row("1", "애월 해변"), row("2", "성산 일출봉")]);
        let mut view = ViewState::new();
        view.set_tab(Tab::Map);
        view.set_search("성산");

        let results = view.search_results(&list);
        assert_eq!(results.len(), 1);
        let id = results[0].id().clone();

        view.choose_search_result(id);
        assert_eq!(view.search_text(), "");
        assert_eq!(view.tab(), Tab::Home);
        assert_eq!(view.selected(&list).unwrap().name(), "성산 일출봉");
    }

    #[test]
    fn map_selection_keeps_tab() {
        let mut view = ViewState::new();
        view.set_tab(Tab::Map);
        view.handle_map_event(MapEvent::Selected(LocationId::from("2")));
        assert_eq!(view.tab(), Tab::Map);

        view.place_added(LocationId::from("3"));
        assert_eq!(view.tab(), Tab::Home);
    }

    #[test]
    fn recommendations_skip_home_card() {
        let list = score_all(vec![row("1", "a"), row("2", "b"), row("3", "c")]);
        let view = ViewState::new();
        let recs: Vec<&str> = view
            .recommendations(&list)
            .iter()
            .map(|l| l.id().as_str())
            .collect();
        assert_eq!(recs, vec!["2", "3"]);
    }

    #[test]
    fn auth_screens() {
        let mut view = ViewState::new();
        assert_eq!(view.auth_screen(), AuthScreen::Login);
        view.set_auth_message("bad");
        view.toggle_auth_form();
        assert_eq!(view.auth_screen(), AuthScreen::SignUp);
        assert!(view.auth_message().is_none());
        view.toggle_auth_form();
        assert_eq!(view.auth_screen(), AuthScreen::Login);

        view.browse();
        assert_eq!(view.auth_screen(), AuthScreen::App);
        assert!(view.is_anonymous());
        assert_eq!(view.display_name(), ANONYMOUS_NAME);
    }

    #[test]
    fn session_changes() {
        let mut view = ViewState::new();
        view.on_session(Some(&session(Some("mozzi@jeju.kr"))));
        assert_eq!(view.auth_screen(), AuthScreen::App);
        assert_eq!(view.display_name(), "mozzi");

        view.on_session(Some(&session(None)));
        assert_eq!(view.display_name(), FALLBACK_NAME);

        view.on_session(None);
        assert_eq!(view.auth_screen(), AuthScreen::App);
        assert_eq!(view.display_name(), ANONYMOUS_NAME);
    }
}
