pub mod appointment;
pub mod non_working_day;
pub mod schedule;
pub mod specialty;
pub mod user;

pub use appointment::{Appointment, AppointmentDetail, AppointmentStatus};
pub use non_working_day::NonWorkingDay;
pub use schedule::{Period, ScheduleTemplate};
pub use specialty::Specialty;
pub use user::User;
