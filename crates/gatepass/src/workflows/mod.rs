pub mod checkins;
