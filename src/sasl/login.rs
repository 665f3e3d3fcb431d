/*
 * login.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Tagliacarte, a cross-platform email client.
 *
 * Tagliacarte is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Tagliacarte is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Tagliacarte.  If not, see <http://www.gnu.org/licenses/>.
 */

//! SASL LOGIN (non-standard but near-universal): no initial response, two
//! challenges answered in turn with the username then the password. The
//! challenge text itself ("Username:"/"Password:") is not interpreted —
//! the two answers are always sent in that fixed order.

use super::{SaslError, SaslMechanism};

pub struct Login {
    username: String,
    password: String,
    step: u8,
}

impl Login {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: password.into(), step: 0 }
    }
}

impl SaslMechanism for Login {
    fn name(&self) -> &'static str {
        "LOGIN"
    }

    fn initial_response(&mut self) -> Option<Vec<u8>> {
        None
    }

    fn respond(&mut self, _challenge: &[u8]) -> Result<Vec<u8>, SaslError> {
        match self.step {
            0 => {
                self.step = 1;
                Ok(self.username.as_bytes().to_vec())
            }
            1 => {
                self.step = 2;
                Ok(self.password.as_bytes().to_vec())
            }
            _ => Err(SaslError::new("LOGIN exchange already complete")),
        }
    }

    fn is_complete(&self) -> bool {
        self.step >= 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers_username_then_password_in_order() {
        let mut mech = Login::new("tim", "secret");
        assert_eq!(mech.initial_response(), None);
        assert_eq!(mech.respond(b"Username:").unwrap(), b"tim");
        assert!(!mech.is_complete());
        assert_eq!(mech.respond(b"Password:").unwrap(), b"secret");
        assert!(mech.is_complete());
    }

    #[test]
    fn errors_on_extra_challenge() {
        let mut mech = Login::new("tim", "secret");
        mech.respond(b"Username:").unwrap();
        mech.respond(b"Password:").unwrap();
        assert!(mech.respond(b"more?").is_err());
    }
}
