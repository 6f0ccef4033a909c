//! Interactive terminal session.
//!
//! Starts on the auth screen (sign in, sign up or browse anonymously),
//! then offers a menu over the home card, ratings, search, the map and
//! the add-place form. The location list stays live while the session
//! runs.

use dialoguer::{Confirm, Input, Password, Select};
use mozzi_app::App;
use mozzi_app::config::Config;
use mozzi_app::places::NewPlaceForm;
use mozzi_app::submit::{RatingState, anonymous_message};
use mozzi_app::view::{AuthScreen, Tab, ViewState};
use mozzi_location_models::{Dimension, Level};
use mozzi_map::{MapRenderer, MapView, TextRenderer};

use crate::card;

/// Menu entries once past the auth screen.
enum Action {
    Home,
    RateCongestion,
    RateParking,
    Search,
    Map,
    AddPlace,
    Account,
    Quit,
}

impl Action {
    const ALL: &[Self] = &[
        Self::Home,
        Self::RateCongestion,
        Self::RateParking,
        Self::Search,
        Self::Map,
        Self::AddPlace,
        Self::Account,
        Self::Quit,
    ];

    #[must_use]
    const fn label(&self, anonymous: bool) -> &'static str {
        match self {
            Self::Home => "Show the home card",
            Self::RateCongestion => "Report congestion",
            Self::RateParking => "Report parking",
            Self::Search => "Search places",
            Self::Map => "Pick a place on the map",
            Self::AddPlace => "Add a place",
            Self::Account if anonymous => "Sign in",
            Self::Account => "Sign out",
            Self::Quit => "Quit",
        }
    }
}

/// Runs the session until the user quits.
///
/// # Errors
///
/// Returns an error if configuration is missing, the first fetch fails,
/// or the terminal cannot be read.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("Mozzi Map");
    println!();

    let app = App::connect(Config::from_env()?)?;
    let handle = app.start().await?;
    let mut view = ViewState::new();

    match app.auth().current_session().await {
        Ok(session) => view.on_session(session.as_ref()),
        Err(e) => log::warn!("Could not restore session: {e}"),
    }

    loop {
        if view.auth_screen() != AuthScreen::App {
            if !auth_screen(&app, &mut view).await? {
                break;
            }
            continue;
        }

        let tabs: Vec<String> = Tab::ALL
            .iter()
            .map(|t| {
                if *t == view.tab() {
                    format!("[{t}]")
                } else {
                    t.to_string()
                }
            })
            .collect();
        println!("{} · {}", view.display_name(), tabs.join(" "));

        let anonymous = view.is_anonymous();
        let labels: Vec<&str> = Action::ALL.iter().map(|a| a.label(anonymous)).collect();
        let idx = Select::new()
            .with_prompt("What would you like to do?")
            .items(&labels)
            .default(0)
            .interact()?;

        match Action::ALL[idx] {
            Action::Home => {
                view.set_tab(Tab::Home);
                show_home(&app, &view);
            }
            Action::RateCongestion => rate(&app, &mut view, Dimension::Congestion).await?,
            Action::RateParking => rate(&app, &mut view, Dimension::Parking).await?,
            Action::Search => search(&app, &mut view)?,
            Action::Map => pick_on_map(&app, &mut view)?,
            Action::AddPlace => add_place(&app, &mut view).await?,
            Action::Account => {
                if view.is_anonymous() {
                    view.toggle_auth_form();
                } else {
                    app.sign_out(&mut view).await;
                    println!("Signed out. Browsing as {}.", view.display_name());
                }
            }
            Action::Quit => break,
        }
        println!();
    }

    handle.stop().await;
    Ok(())
}

/// Shows the login or sign-up form. Returns `false` when the user quits.
async fn auth_screen(app: &App, view: &mut ViewState) -> Result<bool, Box<dyn std::error::Error>> {
    let signing_up = view.auth_screen() == AuthScreen::SignUp;
    if let Some(message) = view.auth_message() {
        println!("{message}");
    }

    let items = if signing_up {
        ["Sign up", "I already have an account", "Browse without an account", "Quit"]
    } else {
        ["Sign in", "Create an account", "Browse without an account", "Quit"]
    };
    let choice = Select::new()
        .with_prompt(if signing_up { "Sign up" } else { "Sign in" })
        .items(&items)
        .default(0)
        .interact()?;

    match choice {
        0 => {
            let email: String = Input::new().with_prompt("Email").interact_text()?;
            let password = Password::new().with_prompt("Password").interact()?;

            let result = if signing_up {
                app.sign_up(view, &email, &password).await.map(|_| ())
            } else {
                app.sign_in(view, &email, &password).await
            };
            if let Err(e) = result {
                log::debug!("Authentication failed: {e}");
            }
        }
        1 => view.toggle_auth_form(),
        2 => view.browse(),
        _ => return Ok(false),
    }
    Ok(true)
}

fn show_home(app: &App, view: &ViewState) {
    let snapshot = app.sync().snapshot();
    let Some(selected) = view.selected(&snapshot.locations) else {
        println!("No places yet.");
        return;
    };
    let recommendations = view.recommendations(&snapshot.locations);
    for line in card::home_card(selected, &recommendations) {
        println!("{line}");
    }
}

async fn rate(
    app: &App,
    view: &mut ViewState,
    dimension: Dimension,
) -> Result<(), Box<dyn std::error::Error>> {
    view.set_tab(Tab::Home);
    if view.is_anonymous() {
        println!("{}", anonymous_message(dimension));
        return Ok(());
    }

    let snapshot = app.sync().snapshot();
    let Some(selected) = view.selected(&snapshot.locations) else {
        println!("No places yet.");
        return Ok(());
    };
    if app.submitter().locks().state(selected.id(), dimension) != RatingState::Idle {
        println!("Already reported {}. Try again in a moment.", selected.name());
        return Ok(());
    }

    let items: Vec<String> = Level::ALL
        .iter()
        .map(|level| card::level_choice(dimension, *level))
        .collect();
    let Some(idx) = Select::new()
        .with_prompt(format!("{dimension} at {}", selected.name()))
        .items(&items)
        .default(0)
        .interact_opt()?
    else {
        return Ok(());
    };

    let comment = if dimension == Dimension::Congestion {
        let text: String = Input::new()
            .with_prompt("Comment (optional)")
            .allow_empty(true)
            .interact_text()?;
        Some(text).filter(|c| !c.trim().is_empty())
    } else {
        None
    };

    match app
        .report_selected(view, dimension, Level::ALL[idx], comment)
        .await
    {
        Ok(Some(outcome)) => println!("{}", card::outcome_message(&outcome)),
        Ok(None) => println!("No places yet."),
        Err(rejection) => println!("{rejection}"),
    }
    Ok(())
}

fn search(app: &App, view: &mut ViewState) -> Result<(), Box<dyn std::error::Error>> {
    let query: String = Input::new()
        .with_prompt("Search")
        .with_initial_text(view.search_text())
        .allow_empty(true)
        .interact_text()?;
    view.set_search(query);

    let snapshot = app.sync().snapshot();
    let results = view.search_results(&snapshot.locations);
    if results.is_empty() {
        println!("No matches.");
        return Ok(());
    }

    let labels: Vec<String> = results.iter().map(|s| card::summary_line(s)).collect();
    if let Some(idx) = Select::new()
        .with_prompt("Pick a place")
        .items(&labels)
        .default(0)
        .interact_opt()?
    {
        view.choose_search_result(results[idx].id().clone());
        show_home(app, view);
    }
    Ok(())
}

fn pick_on_map(app: &App, view: &mut ViewState) -> Result<(), Box<dyn std::error::Error>> {
    view.set_tab(Tab::Map);
    let snapshot = app.sync().snapshot();
    let markers = mozzi_map::markers(&snapshot.locations);
    if markers.is_empty() {
        println!("No places yet.");
        return Ok(());
    }

    let selected = view.selected(&snapshot.locations);
    let lines = TextRenderer.render(&MapView::centered_on(selected), &markers);
    let current = selected
        .and_then(|s| markers.iter().position(|m| &m.id == s.id()))
        .unwrap_or(0);

    if let Some(idx) = Select::new()
        .with_prompt("Select a place")
        .items(&lines)
        .default(current)
        .interact_opt()?
        && let Some(event) = mozzi_map::select(&markers, idx)
    {
        view.handle_map_event(event);
        show_home(app, view);
    }
    Ok(())
}

async fn add_place(app: &App, view: &mut ViewState) -> Result<(), Box<dyn std::error::Error>> {
    view.set_tab(Tab::Add);
    let mut form = NewPlaceForm::default();

    if Confirm::new()
        .with_prompt("Look up an address first?")
        .default(false)
        .interact()?
    {
        let address: String = Input::new().with_prompt("Address").interact_text()?;
        match app.places().fill_from_address(&address, &mut form).await {
            Ok(place) => println!(
                "Found {} ({}, {})",
                place.address, place.latitude, place.longitude
            ),
            Err(e) => println!("{}", e.user_message()),
        }
    }

    loop {
        form.name = prompt_field("Name", &form.name)?;
        form.lat = prompt_field("Latitude", &form.lat)?;
        form.lng = prompt_field("Longitude", &form.lng)?;

        match app.add_place(view, &mut form).await {
            Ok(row) => {
                println!("Added {}.", row.name);
                show_home(app, view);
                return Ok(());
            }
            Err(e) => println!("{}", e.user_message()),
        }

        if !Confirm::new()
            .with_prompt("Try again?")
            .default(true)
            .interact()?
        {
            return Ok(());
        }
    }
}

fn prompt_field(prompt: &str, current: &str) -> Result<String, dialoguer::Error> {
    Input::new()
        .with_prompt(prompt)
        .with_initial_text(current)
        .allow_empty(true)
        .interact_text()
}
