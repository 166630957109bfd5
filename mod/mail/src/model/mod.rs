mod disposition;
mod mail;

pub use disposition::{Disposition, DispositionStatus, HistoryEntry, RouteCommand};
pub use mail::{CreateIncomingMail, CreateOutgoingMail, IncomingMail, MailKind, OutgoingMail};
