mod common;

use common::new_game;
use nardis_core::{Nardis, PlayerKind};

fn check_world(game: &Nardis) {
    for resource in game.data.resources.values() {
        assert!(
            resource.min_value <= resource.value && resource.value <= resource.max_value,
            "{} out of bounds on turn {}: {} not in [{}, {}]",
            resource.name,
            game.turn,
            resource.value,
            resource.min_value,
            resource.max_value
        );
    }

    for (id, city) in &game.data.cities {
        assert!(
            city.current_route_count <= city.max_concurrent_routes,
            "{} over capacity on turn {}",
            city.name,
            game.turn
        );
        for entry in &city.supply {
            assert!(!city.demands(entry.resource), "{} supplies what it demands", city.name);
            assert!(entry.available <= entry.amount);
        }

        let reserved = game
            .players
            .values()
            .flat_map(|p| p.all_routes())
            .filter(|r| r.touches(id))
            .count() as u32;
        assert_eq!(reserved, city.current_route_count, "{} slot count drifted", city.name);
    }
}

fn check_stocks(game: &Nardis) {
    let max = game.config.stock.max_stock_amount;
    for owner in game.players.values() {
        assert!(owner.stock.shares_outstanding() <= max);
        for (holder, shares) in &owner.stock.supply {
            assert_eq!(
                game.players[holder].finance.shares_in(owner.id),
                *shares,
                "holdings of {} disagree on turn {}",
                owner.name,
                game.turn
            );
        }
    }
    for holder in game.players.values() {
        for (owner, shares) in &holder.finance.stocks {
            assert_eq!(game.players[owner].stock.shares_held_by(holder.id), *shares);
        }
    }
}

fn check_players(game: &Nardis) {
    for player in game.players.values() {
        assert_eq!(player.range, game.config.level.range_for(player.level));
        if !player.is_active {
            assert!(player.routes.is_empty() && player.queue.is_empty());
            assert!(!player.stock.is_active);
        }
        for route in &player.routes {
            let state = &route.route_state;
            assert!(state.destination == route.city_one || state.destination == route.city_two);
            assert!(state.distance <= route.distance);
        }
    }
}

#[test]
fn invariants_hold_over_long_seeded_runs() {
    for seed in [1, 7, 42] {
        let mut game = new_game(seed);
        for _ in 0..300 {
            game.end_turn().unwrap();
            check_all(&game);
        }
        assert_eq!(game.turn, 301);
    }
}

fn check_all(game: &Nardis) {
    check_world(game);
    check_stocks(game);
    check_players(game);
}

#[test]
fn invariants_hold_through_a_takeover() {
    let mut game = new_game(17);
    for _ in 0..20 {
        game.end_turn().unwrap();
    }

    let active: Vec<_> = game.computers().filter(|p| p.is_active).map(|p| p.id).collect();
    let (acquirer, target) = (active[0], active[1]);
    game.players[acquirer].finance.gold += 5_000_000;
    while game.buy_stock(acquirer, target) {}
    let routes = game.players[acquirer].all_routes().count() + game.players[target].all_routes().count();

    assert!(game.buyout(acquirer, target));
    check_all(&game);
    assert!(!game.players[target].is_active);
    assert_eq!(game.players[acquirer].all_routes().count(), routes);

    for _ in 0..40 {
        game.end_turn().unwrap();
        check_all(&game);
    }
}

#[test]
fn same_seed_plays_out_identically() {
    let mut a = new_game(99);
    let mut b = new_game(99);
    for _ in 0..25 {
        a.end_turn().unwrap();
        b.end_turn().unwrap();
    }
    let a = serde_json::to_value(a.snapshot()).unwrap();
    let b = serde_json::to_value(b.snapshot()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn computers_keep_their_kind() {
    let mut game = new_game(4);
    for _ in 0..10 {
        game.end_turn().unwrap();
    }
    assert!(matches!(game.players[game.human].kind, PlayerKind::Human));
    assert_eq!(game.computers().count(), game.config.opponents);
}

#[test]
fn stock_history_stays_capped() {
    let mut game = new_game(12);
    for _ in 0..40 {
        game.end_turn().unwrap();
    }
    let cap = game.config.stock.max_value_history;
    assert!(game.players.values().all(|p| p.stock.value_history.len() <= cap));
}
