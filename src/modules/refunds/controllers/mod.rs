pub mod refund_controller;
