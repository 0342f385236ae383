mod helpers;
mod mocks;

mod identity;
mod limits;
mod partners;
mod permissions;
mod two_factor;
