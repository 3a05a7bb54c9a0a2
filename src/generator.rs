use chrono::Utc;
use rand::Rng;
use uuid::Uuid;

use crate::models::{Delivery, Item, Order, Payment};

// ============================================================================
// Test-Data Generator
// ============================================================================
//
// Synthesizes plausible orders for the producer binary and for tests.
// `valid_order` always passes validation; `broken_order` applies exactly one
// randomly chosen mutation that makes it fail.
//
// ============================================================================

const NAMES: &[&str] = &["Test Testov", "Ivan Petrov", "Anna Karev", "Olga Smirnova"];
const CITIES: &[&str] = &["Kiryat Mozkin", "Moscow", "Riga", "Tallinn"];
const REGIONS: &[&str] = &["Kraiot", "Central", "Kurzeme", "Harju"];
const BANKS: &[&str] = &["alpha", "sber", "tinkoff", "raiff"];
const PROVIDERS: &[&str] = &["wbpay", "applepay", "gpay"];
const BRANDS: &[&str] = &["Vivienne Sabo", "Mascaras", "L'Oreal", "Maybelline"];
const CURRENCIES: &[&str] = &["USD", "RUB", "EUR"];
const LOCALES: &[&str] = &["en", "ru", "lv"];
const SIZES: &[&str] = &["0", "s", "m", "l"];
const SERVICES: &[&str] = &["meest", "cdek", "dhl"];

fn pick<'a>(rng: &mut impl Rng, values: &'a [&'a str]) -> String {
    values[rng.random_range(0..values.len())].to_string()
}

pub fn valid_order(order_uid: &str) -> Order {
    let mut rng = rand::rng();
    let track_number = format!("WBILM{}TRACK", rng.random_range(100..999));
    let amount = rng.random_range(100..1_000_000);

    let item_count = rng.random_range(1..=3);
    let items = (0..item_count)
        .map(|_| Item {
            chrt_id: rng.random_range(1..100_000_000),
            track_number: track_number.clone(),
            price: rng.random_range(1..500_000),
            rid: Uuid::new_v4().simple().to_string(),
            name: pick(&mut rng, BRANDS),
            sale: rng.random_range(0..99),
            size: pick(&mut rng, SIZES),
            total_price: rng.random_range(1..500_000),
            nm_id: rng.random_range(1..100_000_000),
            brand: pick(&mut rng, BRANDS),
            status: rng.random_range(100..600),
        })
        .collect();

    Order {
        order_uid: order_uid.to_string(),
        track_number,
        entry: "WBIL".to_string(),
        delivery: Delivery {
            name: pick(&mut rng, NAMES),
            phone: format!("+{}", rng.random_range(10_000_000_000u64..99_999_999_999)),
            zip: format!("{}", rng.random_range(100_000..999_999)),
            city: pick(&mut rng, CITIES),
            address: format!("Ploshad Mira {}", rng.random_range(1..200)),
            region: pick(&mut rng, REGIONS),
            email: format!("test{}@gmail.com", rng.random_range(1..10_000)),
        },
        payment: Payment {
            transaction: Uuid::new_v4().simple().to_string(),
            request_id: Uuid::new_v4().simple().to_string(),
            currency: pick(&mut rng, CURRENCIES),
            provider: pick(&mut rng, PROVIDERS),
            amount,
            payment_dt: Utc::now().timestamp(),
            bank: pick(&mut rng, BANKS),
            delivery_cost: rng.random_range(0..5_000),
            goods_total: amount,
            custom_fee: rng.random_range(0..1_000),
        },
        items,
        locale: pick(&mut rng, LOCALES),
        internal_signature: String::new(),
        customer_id: format!("customer-{}", rng.random_range(1..100_000)),
        delivery_service: pick(&mut rng, SERVICES),
        shardkey: format!("{}", rng.random_range(1..10)),
        sm_id: rng.random_range(1..100),
        date_created: Utc::now(),
        oof_shard: "1".to_string(),
    }
}

/// One randomly chosen defect per order. Every mutation in the list is
/// guaranteed to fail validation.
pub fn broken_order(order_uid: &str) -> Order {
    let mutations: &[fn(&mut Order)] = &[
        |o| o.order_uid.clear(),
        |o| o.track_number.clear(),
        |o| o.entry.clear(),
        |o| o.locale.clear(),
        |o| o.customer_id.clear(),
        |o| o.delivery_service.clear(),
        |o| o.shardkey.clear(),
        |o| o.sm_id = 0,
        |o| o.items.clear(),
        |o| o.payment.amount = 0,
        |o| o.payment.transaction.clear(),
        |o| o.payment.currency.clear(),
        |o| o.payment.goods_total = 0,
        |o| o.payment.delivery_cost = -1,
        |o| o.items[0].price = -1,
        |o| o.items[0].total_price = -1,
        |o| o.items[0].sale = -1,
        |o| o.items[0].status = -1,
        |o| o.items[0].name.clear(),
        |o| o.items[0].chrt_id = 0,
        |o| o.delivery.name.clear(),
        |o| o.delivery.phone.clear(),
        |o| o.delivery.email.clear(),
        |o| o.delivery.city.clear(),
        |o| o.delivery.address.clear(),
        |o| o.delivery.zip.clear(),
        |o| o.delivery.region.clear(),
    ];

    let mut order = valid_order(order_uid);
    let idx = rand::rng().random_range(0..mutations.len());
    mutations[idx](&mut order);
    order
}
