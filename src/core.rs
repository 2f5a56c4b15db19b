pub mod account;
pub mod calculator;
pub mod comparison;
pub mod consumption;
pub mod decision;
pub mod interval;
pub mod rate;
pub mod record;
pub mod shutdown;
pub mod switch;
pub mod tariff;
