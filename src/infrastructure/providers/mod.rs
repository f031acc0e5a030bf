pub mod sendgrid;
pub mod smtp;
