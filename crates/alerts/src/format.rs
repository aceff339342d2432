//! Message formatting for Telegram HTML parse mode.

use chrono::NaiveDate;
use flight_core::{Alert, FareQuote, Price, Region};
use std::collections::BTreeMap;
use std::fmt::Write;
use std::time::Duration;

const FLIGHT_SEARCH_URL: &str = "https://www.google.com/travel/flights";

/// Name shown for the departure city in every message.
pub const HOME_CITY: &str = "Buenos Aires";

/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Link to a public flight search for this fare's route and date.
pub fn search_link(fare: &FareQuote) -> String {
    let query = format!(
        "Flights from {} to {} on {} one way",
        fare.origin,
        fare.destination,
        fare.departure_at.format("%Y-%m-%d")
    );
    match url::Url::parse_with_params(FLIGHT_SEARCH_URL, &[("q", query.as_str())]) {
        Ok(url) => url.to_string(),
        Err(_) => FLIGHT_SEARCH_URL.to_string(),
    }
}

fn money(price: Price, currency: &str) -> String {
    format!("${} {}", price, escape_html(currency))
}

fn stops_label(stops: u32) -> String {
    match stops {
        0 => "direct".to_string(),
        1 => "1 stop".to_string(),
        n => format!("{} stops", n),
    }
}

fn bps_label(bps: i32) -> String {
    if bps % 100 == 0 {
        format!("{}%", bps / 100)
    } else {
        format!("{:.2}%", f64::from(bps) / 100.0)
    }
}

fn anchor(href: &str, label: &str) -> String {
    format!("<a href=\"{}\">{}</a>", escape_html(href), escape_html(label))
}

/// Immediate notification for a fare that fell well below its rolling average.
pub fn format_drop_alert(alert: &Alert) -> String {
    let fare = &alert.fare;
    let route = &alert.route;

    let mut msg = format!(
        "📉 <b>PRICE DROP!</b>\n\n\
         <b>Route:</b> {} → {} ({} → {})\n\
         💰 <b>Now:</b> {}\n",
        HOME_CITY,
        escape_html(&route.display_name),
        escape_html(&fare.origin),
        escape_html(&fare.destination),
        money(fare.price, &fare.currency),
    );

    if let (Some(avg), Some(pct)) = (alert.baseline_average(), alert.drop_pct()) {
        let _ = writeln!(
            msg,
            "📊 <b>Average:</b> ${} ({:.1}% lower)",
            avg, pct
        );
    }

    let _ = write!(
        msg,
        "📅 Departure: {}\n\
         🛬 Arrival: {}\n\
         ✈️ Airline: {}\n\
         🔄 Stops: {}\n\n\
         {}",
        fare.departure_at.format("%Y-%m-%d %H:%M"),
        fare.arrival_at.format("%Y-%m-%d %H:%M"),
        escape_html(&fare.carrier),
        fare.stop_count,
        anchor(&search_link(fare), "Search this flight"),
    );

    msg
}

/// Once-a-day summary of held deals, grouped by region.
///
/// Entries are rendered in map order (regions) and slice order (deals).
/// `min_savings_bps` is the qualifying threshold quoted in the header.
pub fn format_digest(
    sections: &BTreeMap<Region, Vec<Alert>>,
    date: NaiveDate,
    min_savings_bps: i32,
) -> String {
    let deal_count: usize = sections.values().map(Vec::len).sum();
    if deal_count == 0 {
        return format_no_deals(date);
    }

    let mut msg = format!(
        "✈️ <b>DAILY FLIGHT DEALS</b> · {}\n\
         {} {} from {} at least {} under your max price\n",
        date.format("%Y-%m-%d"),
        deal_count,
        if deal_count == 1 { "deal" } else { "deals" },
        HOME_CITY,
        bps_label(min_savings_bps),
    );

    for (region, alerts) in sections.iter().filter(|(_, a)| !a.is_empty()) {
        let _ = write!(msg, "\n{} <b>{}</b>\n", region.emoji(), region.label());
        for alert in alerts {
            let fare = &alert.fare;
            let _ = write!(
                msg,
                "• <b>{}</b> ({} → {}): {} · {:.0}% under ${}\n  \
                 📅 {} · {} · {} · {}\n",
                escape_html(&alert.route.display_name),
                escape_html(&fare.origin),
                escape_html(&fare.destination),
                money(fare.price, &fare.currency),
                alert.savings_pct(),
                alert.route.max_price,
                fare.departure_at.format("%Y-%m-%d"),
                escape_html(&fare.carrier),
                stops_label(fare.stop_count),
                anchor(&search_link(fare), "search"),
            );
        }
    }

    msg.push_str("\nBook soon! Prices can change quickly. 🎉");
    msg
}

/// Digest sent when the gate opens with nothing held.
pub fn format_no_deals(date: NaiveDate) -> String {
    format!(
        "✈️ <b>DAILY FLIGHT DEALS</b> · {}\n\n\
         No deals today. I'll keep watching the routes and let you know.",
        date.format("%Y-%m-%d")
    )
}

/// Announcement sent when the bot starts.
pub fn format_startup(route_count: usize, interval: Duration, digest_hour: u32) -> String {
    let hours = interval.as_secs() / 3600;
    let minutes = (interval.as_secs() % 3600) / 60;
    let every = if minutes == 0 {
        format!("{}h", hours)
    } else {
        format!("{}h{:02}m", hours, minutes)
    };
    format!(
        "✈️ <b>Flight Alert Bot is now running!</b>\n\n\
         Watching {} routes every {}. Price drops arrive immediately; \
         the daily digest goes out after {:02}:00.",
        route_count, every, digest_hour
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use flight_core::{RoutePolicy, BUENOS_AIRES};
    use pretty_assertions::assert_eq;

    fn fare(dest: &str, cents: u64) -> FareQuote {
        let day = NaiveDate::from_ymd_opt(2026, 11, 18).unwrap();
        FareQuote {
            price: Price::from_cents(cents),
            currency: "USD".to_string(),
            departure_at: day.and_hms_opt(9, 15, 0).unwrap(),
            arrival_at: day.and_hms_opt(23, 5, 0).unwrap(),
            carrier: "CM".to_string(),
            stop_count: 1,
            origin: "EZE".to_string(),
            destination: dest.to_string(),
        }
    }

    fn route(dest: &str, name: &str, region: Region, max: u64) -> RoutePolicy {
        RoutePolicy::new(&BUENOS_AIRES, dest, name, region, Price::from_units(max))
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("A & B <b>\"x\""), "A &amp; B &lt;b&gt;&quot;x&quot;");
        assert_eq!(escape_html("São Paulo"), "São Paulo");
    }

    #[test]
    fn test_search_link_is_encoded() {
        let link = search_link(&fare("JFK", 50000));
        assert!(link.starts_with("https://www.google.com/travel/flights?q="));
        assert!(link.contains("EZE"));
        assert!(link.contains("2026-11-18"));
        assert!(!link.contains(' '));
    }

    #[test]
    fn test_drop_alert_contents() {
        let alert = Alert::price_drop(
            route("JFK", "New York", Region::UnitedStates, 700),
            fare("JFK", 45000),
            Price::from_units(600),
            2500,
        );
        let msg = format_drop_alert(&alert);
        assert!(msg.starts_with("📉 <b>PRICE DROP!</b>"));
        assert!(msg.contains("Buenos Aires → New York (EZE → JFK)"));
        assert!(msg.contains("$450.00 USD"));
        assert!(msg.contains("$600.00 (25.0% lower)"));
        assert!(msg.contains("Departure: 2026-11-18 09:15"));
        assert!(msg.contains("<a href=\"https://www.google.com/travel/flights?q="));
    }

    #[test]
    fn test_digest_groups_by_region() {
        let mut sections = BTreeMap::new();
        sections.insert(
            Region::Brazil,
            vec![Alert::digest(
                route("GRU", "São Paulo", Region::Brazil, 150),
                fare("GRU", 9900),
                3400,
            )],
        );
        sections.insert(
            Region::UnitedStates,
            vec![
                Alert::digest(route("MIA", "Miami", Region::UnitedStates, 700), fare("MIA", 45000), 3571),
                Alert::digest(route("JFK", "New York", Region::UnitedStates, 700), fare("JFK", 50000), 2857),
            ],
        );

        let msg = format_digest(&sections, today(), 2000);
        assert!(msg.contains("DAILY FLIGHT DEALS</b> · 2026-10-19"));
        assert!(msg.contains("3 deals from Buenos Aires at least 20% under"));

        let us = msg.find("United States").unwrap();
        let br = msg.find("Brazil").unwrap();
        let miami = msg.find("Miami").unwrap();
        let ny = msg.find("New York").unwrap();
        assert!(us < miami && miami < ny && ny < br);
        assert!(msg.contains("$500.00 USD · 29% under $700.00"));
        assert!(msg.contains("1 stop"));
    }

    #[test]
    fn test_digest_header_quotes_configured_threshold() {
        let mut sections = BTreeMap::new();
        sections.insert(
            Region::UnitedStates,
            vec![Alert::digest(route("MIA", "Miami", Region::UnitedStates, 700), fare("MIA", 45000), 3571)],
        );

        let msg = format_digest(&sections, today(), 3000);
        assert!(msg.contains("1 deal from Buenos Aires at least 30% under your max price"));
        assert!(!msg.contains("at least 20%"));

        let msg = format_digest(&sections, today(), 1250);
        assert!(msg.contains("at least 12.50% under"));
    }

    #[test]
    fn test_empty_digest_is_no_deals() {
        let mut sections: BTreeMap<Region, Vec<Alert>> = BTreeMap::new();
        sections.insert(Region::Asia, Vec::new());
        assert_eq!(format_digest(&sections, today(), 2000), format_no_deals(today()));
        assert!(format_no_deals(today()).contains("No deals today"));
    }

    #[test]
    fn test_startup_message() {
        let msg = format_startup(22, Duration::from_secs(6 * 3600), 9);
        assert!(msg.contains("Watching 22 routes every 6h"));
        assert!(msg.contains("after 09:00"));
        let msg = format_startup(3, Duration::from_secs(2 * 3600 + 30 * 60), 9);
        assert!(msg.contains("every 2h30m"));
    }

    #[test]
    fn test_stops_label() {
        assert_eq!(stops_label(0), "direct");
        assert_eq!(stops_label(1), "1 stop");
        assert_eq!(stops_label(3), "3 stops");
    }
}
