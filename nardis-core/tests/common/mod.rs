#![allow(dead_code)]

use nardis_core::{CityId, GameConfig, Nardis, PlayerId, TrainId};

pub fn new_game(seed: u64) -> Nardis {
    Nardis::new(GameConfig::default().with_seed(seed), "Ada").expect("default config seats four players")
}

/// Cheapest train `player` may run right now.
pub fn cheapest_train(game: &Nardis, player: PlayerId) -> TrainId {
    let level = game.players[player].level;
    game.data
        .trains
        .iter()
        .filter(|(_, t)| t.level_required <= level)
        .min_by_key(|(_, t)| t.cost)
        .map(|(id, _)| id)
        .expect("a novice train exists")
}

/// The closest city `player` can build to from its start city.
pub fn nearest_route(game: &Nardis, player: PlayerId) -> (CityId, CityId, TrainId) {
    let train = cheapest_train(game, player);
    let from = game.players[player].start_city;
    let to = game
        .data
        .cities
        .keys()
        .filter_map(|to| game.quote_route(player, from, to, train).map(|q| (to, q.distance)))
        .filter(|(to, _)| !game.data.cities[*to].is_full())
        .min_by_key(|(_, distance)| *distance)
        .map(|(to, _)| to)
        .expect("some city is within novice range");
    (from, to, train)
}

pub fn rival(game: &Nardis) -> PlayerId {
    game.computers().next().map(|p| p.id).expect("at least one computer")
}
