/// Identity context resolved by the upstream gateway. The engine trusts
/// it as given; authorization decisions happen before requests reach us.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Customer,
    Vendor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Vendor => "vendor",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "vendor" => Role::Vendor,
            "admin" => Role::Admin,
            _ => Role::Customer,
        }
    }
}
