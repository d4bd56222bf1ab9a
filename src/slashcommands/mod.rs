pub mod static_reply;
