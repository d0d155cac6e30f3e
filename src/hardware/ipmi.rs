pub mod dell_bmc;
