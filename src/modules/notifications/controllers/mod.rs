pub mod callback_controller;
