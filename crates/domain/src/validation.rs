//! Structural and semantic validation of decoded orders.

use std::sync::LazyLock;

use regex::Regex;

use crate::{Delivery, FieldViolation, Item, Order, Payment, Rule, ValidationError};

/// Required length of `delivery.zip`.
pub const ZIP_LENGTH: usize = 7;
/// Required length of `payment.currency`.
pub const CURRENCY_LENGTH: usize = 3;

static E164: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+[1-9][0-9]{1,14}$").expect("static e164 pattern"));
static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s.]+(\.[^@\s.]+)+$").expect("static email pattern")
});

/// Validates orders and collects every violated constraint.
///
/// Validation failures are permanent: callers drop the message instead of
/// retrying it.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderValidator;

impl OrderValidator {
    pub fn new() -> Self {
        Self
    }

    /// Returns `Ok(())` if the order satisfies every rule, otherwise an error
    /// listing all violations in field order.
    pub fn validate(&self, order: &Order) -> Result<(), ValidationError> {
        let mut checks = Checks::default();

        checks.required("order_uid", &order.order_uid);
        checks.required("track_number", &order.track_number);
        checks.required("entry", &order.entry);
        checks.delivery(&order.delivery);
        checks.payment(&order.payment);

        if order.items.is_empty() {
            checks.push("items", Rule::Required);
        }
        for (index, item) in order.items.iter().enumerate() {
            checks.item(index, item);
        }

        checks.required("locale", &order.locale);
        checks.required("customer_id", &order.customer_id);
        checks.required("delivery_service", &order.delivery_service);
        checks.required("shardkey", &order.shardkey);
        checks.non_zero("sm_id", order.sm_id);

        checks.finish()
    }
}

#[derive(Default)]
struct Checks {
    violations: Vec<FieldViolation>,
}

impl Checks {
    fn push(&mut self, field: impl Into<String>, rule: Rule) {
        self.violations.push(FieldViolation::new(field, rule));
    }

    /// Records a violation and returns false if the value is blank.
    fn required(&mut self, field: &str, value: &str) -> bool {
        if value.trim().is_empty() {
            self.push(field, Rule::Required);
            return false;
        }
        true
    }

    fn non_zero(&mut self, field: &str, value: i64) {
        if value == 0 {
            self.push(field, Rule::Required);
        }
    }

    fn min(&mut self, field: &str, value: i64, min: i64) {
        if value < min {
            self.push(field, Rule::Min { min });
        }
    }

    fn payment(&mut self, payment: &Payment) {
        self.required("payment.transaction", &payment.transaction);
        if self.required("payment.currency", &payment.currency) {
            if payment.currency.chars().count() != CURRENCY_LENGTH {
                self.push(
                    "payment.currency",
                    Rule::Length {
                        len: CURRENCY_LENGTH,
                    },
                );
            } else if !payment.currency.chars().all(|c| c.is_ascii_alphabetic()) {
                self.push("payment.currency", Rule::Format { format: "iso4217" });
            }
        }
        self.required("payment.provider", &payment.provider);
        self.min("payment.amount", payment.amount, 0);
        self.min("payment.payment_dt", payment.payment_dt, 1);
        self.required("payment.bank", &payment.bank);
        self.min("payment.delivery_cost", payment.delivery_cost, 0);
        self.min("payment.goods_total", payment.goods_total, 0);
    }

    fn delivery(&mut self, delivery: &Delivery) {
        self.required("delivery.name", &delivery.name);
        if self.required("delivery.phone", &delivery.phone) && !E164.is_match(&delivery.phone) {
            self.push("delivery.phone", Rule::Format { format: "e164" });
        }
        if self.required("delivery.zip", &delivery.zip)
            && delivery.zip.chars().count() != ZIP_LENGTH
        {
            self.push("delivery.zip", Rule::Length { len: ZIP_LENGTH });
        }
        self.required("delivery.city", &delivery.city);
        self.required("delivery.address", &delivery.address);
        self.required("delivery.region", &delivery.region);
        if self.required("delivery.email", &delivery.email) && !EMAIL.is_match(&delivery.email) {
            self.push("delivery.email", Rule::Format { format: "email" });
        }
    }

    fn item(&mut self, index: usize, item: &Item) {
        let field = |name: &str| format!("items[{index}].{name}");

        self.non_zero(&field("chrt_id"), item.chrt_id);
        self.min(&field("price"), item.price, 0);
        self.required(&field("rid"), &item.rid);
        self.required(&field("name"), &item.name);
        self.min(&field("sale"), i64::from(item.sale), 0);
        if item.sale > 100 {
            self.push(field("sale"), Rule::Max { max: 100 });
        }
        self.min(&field("total_price"), item.total_price, 0);
        self.non_zero(&field("nm_id"), item.nm_id);
        self.required(&field("brand"), &item.brand);
    }

    fn finish(self) -> Result<(), ValidationError> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                violations: self.violations,
            })
        }
    }
}
