use crate::domain::validation::ValidationError;
use crate::domain::value::{RawPhoneNumber, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Which side of the conversation a message list should contain.
pub enum DeliveryStateFilter {
    /// Messages this device sent (sent box).
    Sent,
    /// Messages this device received (inbox).
    Received,
    /// Both boxes.
    #[default]
    Any,
}

impl DeliveryStateFilter {
    /// Convert the host's integer delivery state (`0` sent, `1` received, `2` unknown).
    pub fn from_code(code: i32) -> Result<Self, ValidationError> {
        Ok(match code {
            0 => Self::Sent,
            1 => Self::Received,
            2 => Self::Any,
            _ => return Err(ValidationError::UnknownDeliveryState { code }),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Restrictions applied when creating a message list.
///
/// An empty filter lists every inbox and sent-box message in ascending date order.
pub struct MessageFilter {
    start: Option<Timestamp>,
    end: Option<Timestamp>,
    numbers: Vec<RawPhoneNumber>,
    delivery: DeliveryStateFilter,
    reverse: bool,
}

impl MessageFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a filter from the host's raw arguments.
    ///
    /// A zero start or end date means "unbounded" on that side.
    pub fn from_host(
        start_date: i64,
        end_date: i64,
        numbers: &[String],
        delivery_state: i32,
        reverse: bool,
    ) -> Result<Self, ValidationError> {
        let numbers = numbers
            .iter()
            .map(|number| RawPhoneNumber::new(number.as_str()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            start: (start_date != 0).then(|| Timestamp::from_millis(start_date)),
            end: (end_date != 0).then(|| Timestamp::from_millis(end_date)),
            numbers,
            delivery: DeliveryStateFilter::from_code(delivery_state)?,
            reverse,
        })
    }

    /// Only include messages dated at or after `start`.
    pub fn since(mut self, start: Timestamp) -> Self {
        self.start = Some(start);
        self
    }

    /// Only include messages dated at or before `end`.
    pub fn until(mut self, end: Timestamp) -> Self {
        self.end = Some(end);
        self
    }

    /// Only include messages exchanged with one of `numbers`.
    pub fn numbers(mut self, numbers: Vec<RawPhoneNumber>) -> Self {
        self.numbers = numbers;
        self
    }

    pub fn delivery(mut self, delivery: DeliveryStateFilter) -> Self {
        self.delivery = delivery;
        self
    }

    /// List newest messages first.
    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    pub fn start(&self) -> Option<Timestamp> {
        self.start
    }

    pub fn end(&self) -> Option<Timestamp> {
        self.end
    }

    pub fn number_list(&self) -> &[RawPhoneNumber] {
        &self.numbers
    }

    pub fn delivery_state(&self) -> DeliveryStateFilter {
        self.delivery
    }

    pub fn is_reverse(&self) -> bool {
        self.reverse
    }
}
