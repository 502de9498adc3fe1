use rand::Rng;

const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_LENGTH: usize = 8;

/// Issues ticket codes of the form `{prefix}-XXXXXXXX`.
#[derive(Debug, Clone)]
pub struct TicketIssuer {
    prefix: String,
}

impl TicketIssuer {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn issue(&self) -> String {
        let mut rng = rand::thread_rng();
        let code: String = (0..CODE_LENGTH)
            .map(|_| CODE_CHARSET[rng.gen_range(0..CODE_CHARSET.len())] as char)
            .collect();
        format!("{}-{}", self.prefix, code)
    }
}

impl Default for TicketIssuer {
    fn default() -> Self {
        Self::new("CL")
    }
}
