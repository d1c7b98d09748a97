//! Routes: a train shuttling between two cities.
//!
//! A route is always on one leg of its revolution. While travelling, each turn
//! knocks the train's effective speed off the remaining distance. The turn the
//! distance runs out the route is flagged as arrived and finance settles the
//! delivery. On the following turn the route turns around, reloads at the
//! city it arrived in and heads back.

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::city::City;
use crate::error::NardisError;
use crate::types::{CityId, Identifiable, ResourceId, RouteId, TrainId, TurnAdvanceable};

/// One planned cargo line: how much the player wants to carry and how much
/// was actually loaded on the current leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CargoItem {
    pub resource: ResourceId,
    pub target_amount: u32,
    pub actual_amount: u32,
}

impl CargoItem {
    pub fn planned(resource: ResourceId, target_amount: u32) -> Self {
        Self {
            resource,
            target_amount,
            actual_amount: 0,
        }
    }
}

/// Cargo loaded at each end. `city_one` is loaded at city one for the leg
/// towards city two, `city_two` for the way back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutePlanCargo {
    pub city_one: Vec<CargoItem>,
    pub city_two: Vec<CargoItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteState {
    pub has_arrived: bool,
    pub destination: CityId,
    /// Kilometres left on this leg; may dip below zero on the arriving turn
    pub distance: i64,
    pub cargo: Vec<CargoItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub id: RouteId,
    pub name: String,
    pub city_one: CityId,
    pub city_two: CityId,
    pub train: TrainId,
    pub route_plan_cargo: RoutePlanCargo,
    pub distance: i64,
    /// Track cost paid when the route was bought
    pub cost: i64,
    pub purchased_on_turn: u32,
    pub route_state: RouteState,
    pub profit: i64,
    pub kilometers_travelled: i64,
}

impl Route {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: RouteId,
        name: impl Into<String>,
        cities: (CityId, CityId),
        train: TrainId,
        route_plan_cargo: RoutePlanCargo,
        distance: i64,
        cost: i64,
        purchased_on_turn: u32,
    ) -> Self {
        let (city_one, city_two) = cities;
        Self {
            id,
            name: name.into(),
            city_one,
            city_two,
            train,
            route_plan_cargo,
            distance,
            cost,
            purchased_on_turn,
            route_state: RouteState {
                has_arrived: false,
                destination: city_two,
                distance,
                cargo: Vec::new(),
            },
            profit: 0,
            kilometers_travelled: 0,
        }
    }

    pub fn connects(&self, a: CityId, b: CityId) -> bool {
        (self.city_one == a && self.city_two == b) || (self.city_one == b && self.city_two == a)
    }

    pub fn touches(&self, city: CityId) -> bool {
        self.city_one == city || self.city_two == city
    }

    pub fn other_city(&self, city: CityId) -> CityId {
        if city == self.city_one {
            self.city_two
        } else {
            self.city_one
        }
    }

    /// The planned cargo for a leg that starts in `origin`.
    pub fn plan_from(&self, origin: CityId) -> &[CargoItem] {
        if origin == self.city_one {
            &self.route_plan_cargo.city_one
        } else {
            &self.route_plan_cargo.city_two
        }
    }

    /// Turns a round trip takes at the given speed.
    pub fn revolution_turns(&self, speed: u32) -> u32 {
        let speed = i64::from(speed.max(1));
        (2 * ((self.distance + speed - 1) / speed)).max(2) as u32
    }

    /// Reset to a freshly departing leg from city one, loading cargo there.
    pub fn depart(&mut self, cities: &mut SlotMap<CityId, City>) -> crate::Result<()> {
        let origin = self.city_one;
        let cargo = self.load_at(origin, cities)?;
        self.route_state = RouteState {
            has_arrived: false,
            destination: self.city_two,
            distance: self.distance,
            cargo,
        };
        Ok(())
    }

    /// Swap train and cargo plan. Profit and mileage only reset when the
    /// train actually changes.
    pub fn change(
        &mut self,
        train: TrainId,
        route_plan_cargo: RoutePlanCargo,
        cities: &mut SlotMap<CityId, City>,
    ) -> crate::Result<()> {
        if train != self.train {
            self.profit = 0;
            self.kilometers_travelled = 0;
        }
        self.train = train;
        self.route_plan_cargo = route_plan_cargo;
        self.depart(cities)
    }

    fn load_at(
        &self,
        origin: CityId,
        cities: &mut SlotMap<CityId, City>,
    ) -> crate::Result<Vec<CargoItem>> {
        let city = cities
            .get_mut(origin)
            .ok_or_else(|| NardisError::dangling(format!("route {}", self.name), "city"))?;
        get_changed_cargo(city, self.plan_from(origin))
    }
}

/// Load a leg's cargo from `city`, draining its available stock.
///
/// Each planned item takes its target amount, or everything left when the
/// city is short. A planned resource the city does not supply means the plan
/// is corrupt.
pub fn get_changed_cargo(city: &mut City, plan: &[CargoItem]) -> crate::Result<Vec<CargoItem>> {
    let city_id = city.id;
    let mut cargo = Vec::with_capacity(plan.len());

    for item in plan {
        let entry = city
            .supply_entry_mut(item.resource)
            .ok_or(NardisError::CorruptCargoPlan {
                city: city_id,
                resource: item.resource,
            })?;

        let loaded = if entry.available < item.target_amount {
            let all = entry.available;
            entry.available = 0;
            all
        } else {
            entry.available -= item.target_amount;
            item.target_amount
        };

        cargo.push(CargoItem {
            resource: item.resource,
            target_amount: item.target_amount,
            actual_amount: loaded,
        });
    }

    Ok(cargo)
}

pub struct RouteTurn<'a> {
    pub cities: &'a mut SlotMap<CityId, City>,
    /// Train speed with upgrades already applied
    pub speed: u32,
}

impl TurnAdvanceable for Route {
    type Context<'a> = RouteTurn<'a>;

    fn handle_turn(&mut self, ctx: RouteTurn<'_>) -> crate::Result<()> {
        if self.route_state.has_arrived {
            let origin = self.route_state.destination;
            let cargo = self.load_at(origin, ctx.cities)?;
            self.route_state = RouteState {
                has_arrived: false,
                destination: self.other_city(origin),
                distance: self.distance,
                cargo,
            };
            return Ok(());
        }

        let step = i64::from(ctx.speed);
        self.route_state.distance -= step;
        self.kilometers_travelled += step;
        if self.route_state.distance <= 0 {
            self.route_state.has_arrived = true;
        }
        Ok(())
    }
}

impl Identifiable for Route {
    type Id = RouteId;

    fn id(&self) -> RouteId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for Route {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}
