mod common;

use common::{new_game, rival};
use nardis_core::{FinanceType, GameConfig, LedgerRef, Nardis, PlayerLevel, SaveGoal, SaveState};

fn duel(seed: u64) -> Nardis {
    Nardis::new(GameConfig::default().with_seed(seed).with_opponents(1), "Ada").unwrap()
}

#[test]
fn computers_buy_every_affordable_upgrade_first() {
    let mut game = new_game(61);
    game.end_turn().unwrap();

    let novice: Vec<_> = game
        .data
        .upgrades
        .iter()
        .filter(|(_, u)| u.level_required == PlayerLevel::Novice)
        .map(|(id, _)| id)
        .collect();
    assert_eq!(novice.len(), 2);

    for computer in game.computers() {
        for upgrade in &novice {
            assert!(computer.owns_upgrade(*upgrade), "{} skipped an upgrade", computer.name);
        }
    }
    assert!(game.players[game.human].upgrades.is_empty());
}

#[test]
fn profitable_computer_buys_the_cheapest_rival_share() {
    let mut game = new_game(67);
    let buyer = rival(&game);
    let turn = game.turn;
    game.players[buyer].finance.add_to_finance_income(
        FinanceType::Cargo,
        LedgerRef::Player(buyer),
        1,
        500_000,
        turn,
    );
    let cheapest = game
        .players
        .values()
        .filter(|p| p.id != buyer)
        .map(|p| p.stock.get_buy_value(&game.config.stock))
        .min()
        .unwrap();

    game.end_turn().unwrap();

    let held: u32 = game
        .players
        .keys()
        .filter(|owner| *owner != buyer)
        .map(|owner| game.players[buyer].finance.shares_in(owner))
        .sum();
    assert_eq!(held, 1);
    let spent = game.players[buyer]
        .finance
        .total_history
        .expense
        .iter()
        .filter(|e| e.kind == FinanceType::Stock)
        .map(|e| e.value)
        .sum::<i64>();
    assert_eq!(spent, cheapest);
}

#[test]
fn poor_opponents_leave_stocks_alone() {
    let mut game = new_game(71);
    game.end_turn().unwrap();
    for computer in game.computers() {
        let rivals = computer
            .finance
            .stocks
            .keys()
            .filter(|owner| *owner != computer.id)
            .count();
        assert_eq!(rivals, 0);
    }
}

#[test]
fn waiting_save_blocks_construction_until_it_expires() {
    let mut game = new_game(73);
    let computer = rival(&game);
    let state = SaveState::new(SaveGoal::Route, game.turn, 3);
    game.players[computer].set_save_state(Some(state));

    for _ in 0..3 {
        game.end_turn().unwrap();
        let player = &game.players[computer];
        assert_eq!(player.save_state(), Some(&state));
        assert!(player.queue.is_empty() && player.routes.is_empty());
    }

    game.end_turn().unwrap();
    assert_ne!(game.players[computer].save_state(), Some(&state));
}

#[test]
fn buyout_save_holds_back_the_takeover() {
    let mut game = duel(79);
    let computer = rival(&game);
    let human = game.human;
    for _ in 0..6 {
        assert!(game.buy_stock(computer, human));
    }
    let state = SaveState::new(SaveGoal::Buyout { target: human }, game.turn, 10);
    game.players[computer].set_save_state(Some(state));

    game.end_turn().unwrap();
    assert!(game.players[human].is_active);
    assert_eq!(game.players[computer].save_state(), Some(&state));
}

#[test]
fn computers_take_over_a_fully_issued_rival() {
    let mut game = duel(83);
    let computer = rival(&game);
    let human = game.human;
    for _ in 0..6 {
        assert!(game.buy_stock(computer, human));
    }
    game.players[computer].finance.gold += 500_000;

    game.end_turn().unwrap();

    assert!(!game.players[human].is_active);
    assert!(game.is_game_over());
    assert_eq!(game.players[computer].finance.shares_in(human), 10);
}
