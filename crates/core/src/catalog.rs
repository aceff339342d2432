//! Built-in route catalog: Buenos Aires departures.

use crate::{Price, Region, RoutePolicy};

/// Buenos Aires airports searched for every route.
pub const BUENOS_AIRES: [&str; 2] = ["AEP", "EZE"];

const LONG_HAUL_MAX: Price = Price::from_units(700);
const REGIONAL_MAX: Price = Price::from_units(150);

/// The default catalog, in digest order.
pub fn default_routes() -> Vec<RoutePolicy> {
    let route = |dest: &str, name: &str, region: Region, max: Price| {
        RoutePolicy::new(&BUENOS_AIRES, dest, name, region, max)
    };

    vec![
        route("JFK", "New York", Region::UnitedStates, LONG_HAUL_MAX),
        route("MIA", "Miami", Region::UnitedStates, LONG_HAUL_MAX),
        route("LAX", "Los Angeles", Region::UnitedStates, LONG_HAUL_MAX),
        route("SFO", "San Francisco", Region::UnitedStates, LONG_HAUL_MAX),
        // Europe (major hubs)
        route("MAD", "Madrid", Region::Europe, LONG_HAUL_MAX),
        route("BCN", "Barcelona", Region::Europe, LONG_HAUL_MAX),
        route("CDG", "Paris", Region::Europe, LONG_HAUL_MAX),
        route("FCO", "Rome", Region::Europe, LONG_HAUL_MAX),
        route("LHR", "London", Region::Europe, LONG_HAUL_MAX),
        route("BKK", "Bangkok", Region::Asia, LONG_HAUL_MAX),
        route("NRT", "Tokyo", Region::Asia, LONG_HAUL_MAX),
        route("PEK", "Beijing", Region::Asia, LONG_HAUL_MAX),
        route("GRU", "São Paulo", Region::Brazil, REGIONAL_MAX),
        route("GIG", "Rio de Janeiro", Region::Brazil, REGIONAL_MAX),
        route("SSA", "Salvador (Beach)", Region::Brazil, REGIONAL_MAX),
        route("REC", "Recife (Beach)", Region::Brazil, REGIONAL_MAX),
        route("FOR", "Fortaleza (Beach)", Region::Brazil, REGIONAL_MAX),
        route("FLN", "Florianópolis (Beach)", Region::Brazil, REGIONAL_MAX),
        route("SCL", "Santiago", Region::Chile, REGIONAL_MAX),
        route("PUQ", "Punta Arenas (South)", Region::Chile, REGIONAL_MAX),
        route("BRC", "Bariloche", Region::Argentina, REGIONAL_MAX),
        route("CPC", "San Martín de los Andes", Region::Argentina, REGIONAL_MAX),
    ]
}
