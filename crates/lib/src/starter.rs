//! Starter game: a lobby and a potion shop, wired with the bundled locale catalogs.
//! Used by the CLI (`quip chat`, `quip run`, `quip check`) and as a worked example of
//! controllers, extractors and navigation.

use anyhow::Result;
use std::sync::Arc;

use crate::answer::ControllerAnswer;
use crate::channels::AnswerChannel;
use crate::controller::{Controller, ControllerRegistry, Extension, RegistryError};
use crate::dispatch::Dispatcher;
use crate::localization::Localizer;
use crate::message::PlayerInfo;
use crate::session::SessionData;

pub const LOBBY: &str = "Lobby";
pub const SHOP: &str = "Shop";

pub const STARTING_GOLD: u64 = 10;
pub const POTION_PRICE: u64 = 3;

const GOLD_KEY: &str = "gold";

/// Phrase lookup for outbound text, shared with handlers as an extension.
#[derive(Clone)]
pub struct Phrases(Arc<dyn Localizer>);

impl Phrases {
    pub fn new(localizer: Arc<dyn Localizer>) -> Self {
        Self(localizer)
    }

    /// A random variant of `path`, with `args` substituted.
    fn say(&self, player: &PlayerInfo, path: &str, args: &[&dyn std::fmt::Display]) -> Result<String> {
        Ok(self.0.get_string(path, &player.locale)?.format(args).render())
    }

    /// The first phrase of an action path: a suggestion the player can tap to trigger it.
    fn command(&self, player: &PlayerInfo, path: &str) -> Result<String> {
        let phrases = self.0.get_string(path, &player.locale)?;
        Ok(phrases.templates().first().cloned().unwrap_or_default())
    }

    fn commands(&self, player: &PlayerInfo, paths: &[&str]) -> Result<Vec<String>> {
        paths.iter().map(|p| self.command(player, p)).collect()
    }
}

fn gold(session: &SessionData) -> u64 {
    session
        .value(GOLD_KEY)
        .and_then(|v| v.as_u64())
        .unwrap_or(STARTING_GOLD)
}

const LOBBY_MENU: [&str; 3] = ["lobby.shop", "lobby.gold", "lobby.help"];
const SHOP_MENU: [&str; 2] = ["shop.buy", "shop.back"];

fn lobby_start(
    player: PlayerInfo,
    mut session: SessionData,
    Extension(phrases): Extension<Phrases>,
) -> Result<(ControllerAnswer, SessionData)> {
    if session.value(GOLD_KEY).is_none() {
        session.set_value(GOLD_KEY, STARTING_GOLD);
    }
    let answer = ControllerAnswer::new(phrases.say(&player, "lobby.welcome", &[])?)
        .with_suggestions(phrases.commands(&player, &LOBBY_MENU)?);
    Ok((answer, session))
}

fn lobby_shop(
    player: PlayerInfo,
    mut session: SessionData,
    Extension(phrases): Extension<Phrases>,
) -> Result<(ControllerAnswer, SessionData)> {
    session.navigation.push(SHOP);
    let answer = ControllerAnswer::new(phrases.say(&player, "shop.enter", &[&POTION_PRICE])?)
        .with_suggestions(phrases.commands(&player, &SHOP_MENU)?);
    Ok((answer, session))
}

async fn lobby_gold(
    player: PlayerInfo,
    session: SessionData,
    Extension(phrases): Extension<Phrases>,
) -> Result<ControllerAnswer> {
    let balance = gold(&session);
    Ok(ControllerAnswer::new(phrases.say(&player, "lobby.balance", &[&balance])?)
        .with_suggestions(phrases.commands(&player, &LOBBY_MENU)?))
}

fn lobby_help(player: PlayerInfo, Extension(phrases): Extension<Phrases>) -> Result<ControllerAnswer> {
    Ok(ControllerAnswer::new(phrases.say(&player, "lobby.helpText", &[])?)
        .with_suggestions(phrases.commands(&player, &["lobby.start", "lobby.shop"])?))
}

fn lobby_unknown(player: PlayerInfo, Extension(phrases): Extension<Phrases>) -> Result<ControllerAnswer> {
    Ok(ControllerAnswer::new(phrases.say(&player, "lobby.unknown", &[])?)
        .with_suggestions(phrases.commands(&player, &["lobby.help"])?))
}

fn shop_buy(
    player: PlayerInfo,
    mut session: SessionData,
    Extension(phrases): Extension<Phrases>,
) -> Result<(ControllerAnswer, SessionData)> {
    let balance = gold(&session);
    let text = match balance.checked_sub(POTION_PRICE) {
        Some(left) => {
            session.set_value(GOLD_KEY, left);
            phrases.say(&player, "shop.bought", &[&left])?
        }
        None => phrases.say(&player, "shop.poor", &[&POTION_PRICE, &balance])?,
    };
    let answer = ControllerAnswer::new(text).with_suggestions(phrases.commands(&player, &SHOP_MENU)?);
    Ok((answer, session))
}

fn shop_back(
    player: PlayerInfo,
    mut session: SessionData,
    Extension(phrases): Extension<Phrases>,
) -> Result<(ControllerAnswer, SessionData)> {
    session.navigation.pop();
    let answer = ControllerAnswer::new(phrases.say(&player, "shop.bye", &[])?)
        .with_suggestions(phrases.commands(&player, &LOBBY_MENU)?);
    Ok((answer, session))
}

fn shop_unknown(player: PlayerInfo, Extension(phrases): Extension<Phrases>) -> Result<ControllerAnswer> {
    Ok(ControllerAnswer::new(phrases.say(&player, "shop.unknown", &[])?)
        .with_suggestions(phrases.commands(&player, &SHOP_MENU)?))
}

/// Lobby (main) and Shop controllers.
pub fn registry() -> Result<ControllerRegistry, RegistryError> {
    ControllerRegistry::builder(LOBBY)
        .controller(
            Controller::new(LOBBY)
                .action("lobby.start", lobby_start)
                .action("lobby.shop", lobby_shop)
                .action_async("lobby.gold", lobby_gold)
                .action("lobby.help", lobby_help)
                .default_handler(lobby_unknown)
                .navigates_to(SHOP),
        )
        .controller(
            Controller::new(SHOP)
                .action("shop.buy", shop_buy)
                .action("shop.back", shop_back)
                .default_handler(shop_unknown),
        )
        .build()
}

/// Dispatcher for the starter game. `localizer` serves both action matching and replies.
pub fn dispatcher(
    localizer: Arc<dyn Localizer>,
    channel: Arc<dyn AnswerChannel>,
) -> Result<Dispatcher, RegistryError> {
    let registry = Arc::new(registry()?);
    Ok(Dispatcher::new(registry, localizer.clone(), channel).with_extension(Phrases::new(localizer)))
}
