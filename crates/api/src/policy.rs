//! Access policy shared by every appointment handler.

use domain::{Appointment, User};

/// A user may touch an appointment if they own it or are an admin.
pub fn can_access_appointment(user: &User, appointment: &Appointment) -> bool {
    user.is_admin || appointment.user_id == user.id
}
