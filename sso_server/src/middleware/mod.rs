mod session;

pub use session::{
    SessionCookieConfig,
    SessionMiddlewareFactory,
    SessionMiddlewareService,
    SessionSlot,
    MIN_SESSION_SECRET_LEN,
    SESSION_COOKIE_NAME,
    SESSION_COOKIE_PATH,
};
