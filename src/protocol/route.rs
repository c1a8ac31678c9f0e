//! Class vocabulary understood by the shell.

use std::fmt;

macro_rules! routes {
    ($($variant:ident => $class:literal,)+) => {
        /// A recognized call class.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Route {
            $(
                #[doc = concat!("`", $class, "`")]
                $variant,
            )+
        }

        impl Route {
            /// Every route, in declaration order.
            pub const ALL: &'static [Route] = &[$(Route::$variant,)+];

            /// Looks up a lowercase class.
            pub fn from_class(class: &str) -> Option<Self> {
                match class {
                    $($class => Some(Self::$variant),)+
                    _ => None,
                }
            }

            /// Wire class of the route.
            pub fn class(self) -> &'static str {
                match self {
                    $(Self::$variant => $class,)+
                }
            }
        }
    };
}

routes! {
    InitProgress => "init.progress",
    InitProgressNext => "init.progress.next",
    InitProgressAlloc => "init.progress.alloc",
    InitStatus => "init.status",
    InitReset => "init.reset",
    ProgressEvent => "common.progress.event",
    ProgressAllocate => "common.progress.allocate",
    ProgressNext => "common.progress.next",
    ProgressSet => "common.progress.set",
    LookupPrefix => "common.lookup.prefix",
    LookupGlob => "common.lookup.glob",
    LookupRegex => "common.lookup.regex",
    ListAdd => "common.list.add",
    ListComplete => "common.list.complete",
    ListReset => "common.list.reset",
    InfoAdd => "common.info.add",
    InfoSet => "common.info.set",
    Title => "common.title",
    Reset => "common.reset",
    LoggerStatus => "logger.status",
    LoggerTitle => "logger.title",
    FieldSetByLabel => "field.set.by-label",
    FieldSetByOrd => "field.set.by-ord",
    FieldAddByLabel => "field.add.by-label",
    FieldAddByOrd => "field.add.by-ord",
    FieldResetByLabel => "field.reset.by-label",
    FieldResetByOrd => "field.reset.by-ord",
    SessionSet => "session.set",
    SessionGet => "session.get",
    SessionKeys => "session.keys",
    SessionDelete => "session.delete",
    SessionFlush => "session.flush",
}

/// Audience of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteScope {
    /// Loader shown while a form is being prepared.
    Loader,
    /// Progress or list landing page.
    Landing,
    /// Logger landing page.
    Logger,
    /// Active argument form.
    Field,
    /// Runtime session store.
    Session,
}

impl Route {
    /// Audience of the route.
    pub fn scope(self) -> RouteScope {
        let class = self.class();
        if class.starts_with("init.") {
            RouteScope::Loader
        } else if class.starts_with("logger.") {
            RouteScope::Logger
        } else if class.starts_with("field.") {
            RouteScope::Field
        } else if class.starts_with("session.") {
            RouteScope::Session
        } else {
            RouteScope::Landing
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.class())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_class_round_trips() {
        for route in Route::ALL {
            assert_eq!(Route::from_class(route.class()), Some(*route));
        }
        assert_eq!(Route::ALL.len(), 32);
    }

    #[test]
    fn test_lookup_is_exact() {
        assert_eq!(Route::from_class("LOGGER.STATUS"), None);
        assert_eq!(Route::from_class("logger"), None);
    }

    #[test]
    fn test_scopes() {
        assert_eq!(Route::InitProgressNext.scope(), RouteScope::Loader);
        assert_eq!(Route::LookupGlob.scope(), RouteScope::Landing);
        assert_eq!(Route::LoggerTitle.scope(), RouteScope::Logger);
        assert_eq!(Route::FieldResetByOrd.scope(), RouteScope::Field);
        assert_eq!(Route::SessionFlush.scope(), RouteScope::Session);
    }
}
