//! Navigation tables for the app shell

/// One navigation entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavLink {
    pub icon: &'static str,
    pub route: &'static str,
    pub label: &'static str,
}

pub const SIDEBAR_LINKS: &[NavLink] = &[
    NavLink {
        icon: "/assets/icons/home.svg",
        route: "/",
        label: "Home",
    },
    NavLink {
        icon: "/assets/icons/wallpaper.svg",
        route: "/explore",
        label: "Explore",
    },
    NavLink {
        icon: "/assets/icons/people.svg",
        route: "/all-users",
        label: "People",
    },
    NavLink {
        icon: "/assets/icons/bookmark.svg",
        route: "/saved",
        label: "Saved",
    },
    NavLink {
        icon: "/assets/icons/gallery-add.svg",
        route: "/create-post",
        label: "Create Post",
    },
];

/// Mobile bar: the sidebar without People
pub const BOTTOMBAR_LINKS: &[NavLink] = &[
    NavLink {
        icon: "/assets/icons/home.svg",
        route: "/",
        label: "Home",
    },
    NavLink {
        icon: "/assets/icons/wallpaper.svg",
        route: "/explore",
        label: "Explore",
    },
    NavLink {
        icon: "/assets/icons/bookmark.svg",
        route: "/saved",
        label: "Saved",
    },
    NavLink {
        icon: "/assets/icons/gallery-add.svg",
        route: "/create-post",
        label: "Create Post",
    },
];

/// Link whose route equals `pathname` exactly
pub fn active_link<'a>(links: &'a [NavLink], pathname: &str) -> Option<&'a NavLink> {
    links.iter().find(|link| link.route == pathname)
}
