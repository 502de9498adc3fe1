use crate::{CoreResult, ReservationError};
use serde::{Deserialize, Serialize};

/// Role asserted by the authentication collaborator. The core trusts it as given.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    CompanyAdmin,
    Admin,
    PaymentGateway,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    HoldSeats,
    ConfirmBooking,
    CancelOwnBooking,
    CancelAnyBooking,
    ReadAnyBooking,
    ManageTrips,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub subject: String,
    pub role: Role,
}

impl Principal {
    pub fn customer(customer_id: impl Into<String>) -> Self {
        Self { subject: customer_id.into(), role: Role::Customer }
    }

    pub fn company_admin(subject: impl Into<String>) -> Self {
        Self { subject: subject.into(), role: Role::CompanyAdmin }
    }

    pub fn admin(subject: impl Into<String>) -> Self {
        Self { subject: subject.into(), role: Role::Admin }
    }

    pub fn payment_gateway() -> Self {
        Self { subject: "payment-gateway".to_string(), role: Role::PaymentGateway }
    }

    pub fn has(&self, capability: Capability) -> bool {
        use Capability::*;
        match self.role {
            Role::Admin => true,
            Role::Customer => matches!(capability, HoldSeats | CancelOwnBooking),
            Role::CompanyAdmin => matches!(capability, ManageTrips | ReadAnyBooking),
            Role::PaymentGateway => matches!(capability, ConfirmBooking | CancelAnyBooking | ReadAnyBooking),
        }
    }

    pub fn require(&self, capability: Capability) -> CoreResult<()> {
        if self.has(capability) {
            Ok(())
        } else {
            Err(ReservationError::Forbidden(format!(
                "{:?} may not {:?}",
                self.role, capability
            )))
        }
    }

    /// Whether this principal may cancel a booking owned by `customer_id`.
    pub fn may_cancel_for(&self, customer_id: &str) -> bool {
        self.has(Capability::CancelAnyBooking)
            || (self.has(Capability::CancelOwnBooking) && self.subject == customer_id)
    }

    pub fn may_read_for(&self, customer_id: &str) -> bool {
        self.has(Capability::ReadAnyBooking) || self.subject == customer_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_capabilities() {
        let customer = Principal::customer("user-1");
        assert!(customer.has(Capability::HoldSeats));
        assert!(!customer.has(Capability::ConfirmBooking));
        assert!(customer.may_cancel_for("user-1"));
        assert!(!customer.may_cancel_for("user-2"));
        assert!(matches!(customer.require(Capability::ManageTrips), Err(ReservationError::Forbidden(_))));
    }

    #[test]
    fn test_gateway_and_admin() {
        let gateway = Principal::payment_gateway();
        assert!(gateway.has(Capability::ConfirmBooking));
        assert!(gateway.may_cancel_for("anyone"));
        assert!(!gateway.has(Capability::HoldSeats));

        let admin = Principal::admin("ops");
        assert!(admin.require(Capability::ManageTrips).is_ok());
        assert!(admin.may_read_for("user-9"));

        let company = Principal::company_admin("nha-xe-1");
        assert!(company.has(Capability::ManageTrips));
        assert!(!company.may_cancel_for("user-9"));
    }
}
